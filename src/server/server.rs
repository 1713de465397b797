use crate::application_impl::InMemoryUserDirectory;
use crate::application_port::{SessionService, TokenCodec};
use crate::domain::{Argon2SecretHasher, JwtTokenCodec, SessionIssuer, TokenConfig};
use crate::domain_port::{CredentialHasher, UserDirectory};
use crate::infra_mysql::MySqlUserDirectory;
use crate::settings::Settings;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    pub session_service: Arc<dyn SessionService>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        // Codec construction is the fail-fast point for missing secrets and
        // TTL ordering; nothing is served if this errors.
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtTokenCodec::new(TokenConfig {
            access_secret: settings.auth.access_secret.clone().into_bytes(),
            refresh_secret: settings.auth.refresh_secret.clone().into_bytes(),
            access_ttl: Duration::from_secs(settings.auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.auth.refresh_ttl_secs),
        })?);

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2SecretHasher);

        let directory: Arc<dyn UserDirectory> = match settings.auth.backend.as_str() {
            "memory" => Arc::new(InMemoryUserDirectory::new(credential_hasher)),
            "mysql" => {
                let pool = Pool::<MySql>::connect(&settings.database.url).await?;
                Arc::new(MySqlUserDirectory::new(pool, credential_hasher))
            }
            other => return Err(anyhow::anyhow!("Unknown auth backend: {}", other)),
        };

        let session_service: Arc<dyn SessionService> =
            Arc::new(SessionIssuer::new(directory, token_codec));

        Ok(Server { session_service })
    }
}
