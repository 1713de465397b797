#[derive(Debug, thiserror::Error)]
#[error("credential hasher: {0}")]
pub struct HasherError(pub String);

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_secret(&self, secret: &str) -> Result<String, HasherError>;

    async fn verify_secret(&self, secret: &str, secret_hash: &str) -> Result<bool, HasherError>;
}
