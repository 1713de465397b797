use crate::domain_port::{CredentialHasher, HasherError};
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

pub struct Argon2SecretHasher;

#[async_trait::async_trait]
impl CredentialHasher for Argon2SecretHasher {
    async fn hash_secret(&self, secret: &str) -> Result<String, HasherError> {
        let salt = argon2::password_hash::SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| HasherError(e.to_string()))?
            .to_string();
        Ok(hash)
    }

    async fn verify_secret(&self, secret: &str, secret_hash: &str) -> Result<bool, HasherError> {
        let parsed = PasswordHash::new(secret_hash)
            .map_err(|e| HasherError(format!("invalid PHC hash: {e}")))?;

        match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HasherError(format!("verify error: {e}"))),
        }
    }
}
