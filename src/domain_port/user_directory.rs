use crate::domain_model::{UserId, UserProfile};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub identity: String,
    pub display_name: String,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub identity: String,
    pub display_name: String,
}

impl UserRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            identity: self.identity.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("identity already registered")]
    DuplicateIdentity,
    #[error("store error: {0}")]
    Store(String),
}

/// Owns user identity, credential verification and the single refresh-token
/// slot per user. Secret hashes never leave the directory; callers only see
/// the boolean outcome of `verify_secret`.
#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError>;

    async fn find_by_identity(&self, identity: &str) -> Result<Option<UserRecord>, DirectoryError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError>;

    async fn verify_secret(&self, id: UserId, candidate: &str) -> Result<bool, DirectoryError>;

    /// Overwrites the slot unconditionally. `None` clears it (logout).
    async fn set_refresh_slot(&self, id: UserId, token: Option<&str>)
    -> Result<(), DirectoryError>;

    /// Compare-and-swap rotation: replaces the slot with `new` only if it
    /// currently holds exactly `expected`. Returns false on any mismatch,
    /// including an empty slot. Must be atomic with respect to concurrent
    /// swaps for the same user.
    async fn swap_refresh_slot(
        &self,
        id: UserId,
        expected: &str,
        new: &str,
    ) -> Result<bool, DirectoryError>;
}
