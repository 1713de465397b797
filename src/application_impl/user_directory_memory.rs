use crate::domain_model::UserId;
use crate::domain_port::{
    CredentialHasher, DirectoryError, NewUser, UserDirectory, UserRecord,
};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

struct StoredUser {
    record: UserRecord,
    secret_hash: String,
    refresh_slot: Option<String>,
}

/// Directory backed by process memory. Used by the "memory" backend and by
/// tests; slot mutations are atomic under the shard lock, matching the
/// single-document-update guarantee the MySQL backend gets from the database.
pub struct InMemoryUserDirectory {
    users: DashMap<UserId, StoredUser>,
    identities: DashMap<String, UserId>,
    hasher: Arc<dyn CredentialHasher>,
}

impl InMemoryUserDirectory {
    pub fn new(hasher: Arc<dyn CredentialHasher>) -> Self {
        InMemoryUserDirectory {
            users: DashMap::new(),
            identities: DashMap::new(),
            hasher,
        }
    }

    fn store_err(e: impl std::fmt::Display) -> DirectoryError {
        DirectoryError::Store(e.to_string())
    }
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError> {
        if self.identities.contains_key(&user.identity) {
            return Err(DirectoryError::DuplicateIdentity);
        }

        // Hash before claiming the identity; the guard must not be held
        // across an await point.
        let secret_hash = self
            .hasher
            .hash_secret(&user.secret)
            .await
            .map_err(Self::store_err)?;

        let id = UserId(Uuid::new_v4());
        if let Some(existing) = self.identities.insert(user.identity.clone(), id) {
            // Lost a race for the same identity; put the winner back.
            self.identities.insert(user.identity.clone(), existing);
            return Err(DirectoryError::DuplicateIdentity);
        }

        let record = UserRecord {
            id,
            identity: user.identity,
            display_name: user.display_name,
        };
        self.users.insert(
            id,
            StoredUser {
                record: record.clone(),
                secret_hash,
                refresh_slot: None,
            },
        );
        Ok(record)
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let Some(id) = self.identities.get(identity).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.record.clone()))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.get(&id).map(|u| u.record.clone()))
    }

    async fn verify_secret(&self, id: UserId, candidate: &str) -> Result<bool, DirectoryError> {
        let Some(hash) = self.users.get(&id).map(|u| u.secret_hash.clone()) else {
            return Ok(false);
        };
        self.hasher
            .verify_secret(candidate, &hash)
            .await
            .map_err(Self::store_err)
    }

    async fn set_refresh_slot(
        &self,
        id: UserId,
        token: Option<&str>,
    ) -> Result<(), DirectoryError> {
        let Some(mut user) = self.users.get_mut(&id) else {
            return Err(DirectoryError::Store(format!("unknown user {id}")));
        };
        user.refresh_slot = token.map(str::to_owned);
        Ok(())
    }

    async fn swap_refresh_slot(
        &self,
        id: UserId,
        expected: &str,
        new: &str,
    ) -> Result<bool, DirectoryError> {
        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(false);
        };
        if user.refresh_slot.as_deref() != Some(expected) {
            return Ok(false);
        }
        user.refresh_slot = Some(new.to_owned());
        Ok(true)
    }
}
