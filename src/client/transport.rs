use crate::application_port::{
    LogoutError, ProfileError, RefreshError, SessionService, SigninError, SigninInput,
    SignupError, SignupInput, TokenPair, VerifyError,
};
use crate::domain_model::UserProfile;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone)]
pub struct SessionHandshake {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

/// The wire protocol as seen from the client. One method per endpoint.
#[async_trait::async_trait]
pub trait SessionTransport: Send + Sync {
    async fn signup(
        &self,
        identity: &str,
        name: &str,
        secret: &str,
    ) -> Result<UserProfile, TransportError>;

    async fn signin(&self, identity: &str, secret: &str)
    -> Result<SessionHandshake, TransportError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TransportError>;

    async fn logout(&self, access_token: &str) -> Result<(), TransportError>;

    async fn current_user(&self, access_token: &str) -> Result<UserProfile, TransportError>;
}

/// In-process transport: calls the service directly, mapping service errors
/// to the statuses an HTTP client would see. Used by tests and demos.
pub struct DirectTransport {
    service: Arc<dyn SessionService>,
}

impl DirectTransport {
    pub fn new(service: Arc<dyn SessionService>) -> Self {
        DirectTransport { service }
    }
}

#[async_trait::async_trait]
impl SessionTransport for DirectTransport {
    async fn signup(
        &self,
        identity: &str,
        name: &str,
        secret: &str,
    ) -> Result<UserProfile, TransportError> {
        self.service
            .signup(SignupInput {
                identity: identity.to_owned(),
                display_name: name.to_owned(),
                secret: secret.to_owned(),
            })
            .await
            .map_err(|e| match e {
                SignupError::Conflict => TransportError::Status(409),
                SignupError::Rejected(_) => TransportError::Status(400),
            })
    }

    async fn signin(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<SessionHandshake, TransportError> {
        let outcome = self
            .service
            .signin(SigninInput {
                identity: identity.to_owned(),
                secret: secret.to_owned(),
            })
            .await
            .map_err(|_: SigninError| TransportError::Unauthorized)?;

        Ok(SessionHandshake {
            user: outcome.user,
            tokens: outcome.tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TransportError> {
        self.service
            .refresh(refresh_token)
            .await
            .map_err(|_: RefreshError| TransportError::Unauthorized)
    }

    async fn logout(&self, access_token: &str) -> Result<(), TransportError> {
        let user = self
            .service
            .verify_access(access_token)
            .await
            .map_err(|_: VerifyError| TransportError::Unauthorized)?;
        self.service.logout(user).await.map_err(|e| match e {
            LogoutError::Storage(_) => TransportError::Status(400),
        })
    }

    async fn current_user(&self, access_token: &str) -> Result<UserProfile, TransportError> {
        let user = self
            .service
            .verify_access(access_token)
            .await
            .map_err(|_: VerifyError| TransportError::Unauthorized)?;
        self.service.current_user(user).await.map_err(|e| match e {
            ProfileError::NotFound => TransportError::Status(404),
            ProfileError::Store(msg) => TransportError::Network(msg),
        })
    }
}
