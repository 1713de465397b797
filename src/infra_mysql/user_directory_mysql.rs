use crate::domain_model::UserId;
use crate::domain_port::{
    CredentialHasher, DirectoryError, NewUser, UserDirectory, UserRecord,
};
use sqlx::{MySqlPool, Row};
use std::sync::Arc;
use uuid::Uuid;

/// MySQL-backed directory. The refresh slot lives in a column on the user
/// row; rotation is a single conditional UPDATE, so the row-level write lock
/// serializes concurrent refresh attempts for the same user.
///
/// Expected schema:
///
/// ```sql
/// CREATE TABLE user (
///     user_id      BINARY(16)   PRIMARY KEY,
///     identity     VARCHAR(255) NOT NULL UNIQUE,
///     display_name VARCHAR(255) NOT NULL,
///     secret_hash  VARCHAR(255) NOT NULL,
///     refresh_slot TEXT         NULL
/// );
/// ```
pub struct MySqlUserDirectory {
    pool: MySqlPool,
    hasher: Arc<dyn CredentialHasher>,
}

impl MySqlUserDirectory {
    pub fn new(pool: MySqlPool, hasher: Arc<dyn CredentialHasher>) -> Self {
        MySqlUserDirectory { pool, hasher }
    }
}

fn record_from_row(row: &sqlx::mysql::MySqlRow) -> UserRecord {
    UserRecord {
        id: row.get::<UserId, _>("user_id"),
        identity: row.get::<String, _>("identity"),
        display_name: row.get::<String, _>("display_name"),
    }
}

fn store_err(e: sqlx::Error) -> DirectoryError {
    DirectoryError::Store(e.to_string())
}

#[async_trait::async_trait]
impl UserDirectory for MySqlUserDirectory {
    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError> {
        let secret_hash = self
            .hasher
            .hash_secret(&user.secret)
            .await
            .map_err(|e| DirectoryError::Store(e.to_string()))?;

        let id = UserId(Uuid::new_v4());
        sqlx::query(
            r#"
INSERT INTO user (user_id, identity, display_name, secret_hash, refresh_slot)
VALUES (?, ?, ?, ?, NULL)
"#,
        )
        .bind(id)
        .bind(&user.identity)
        .bind(&user.display_name)
        .bind(&secret_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DirectoryError::DuplicateIdentity
            }
            _ => store_err(e),
        })?;

        Ok(UserRecord {
            id,
            identity: user.identity,
            display_name: user.display_name,
        })
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let row = sqlx::query(
            "SELECT user_id, identity, display_name FROM user WHERE identity = ?",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, DirectoryError> {
        let row = sqlx::query(
            "SELECT user_id, identity, display_name FROM user WHERE user_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn verify_secret(&self, id: UserId, candidate: &str) -> Result<bool, DirectoryError> {
        let row = sqlx::query("SELECT secret_hash FROM user WHERE user_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        let Some(row) = row else {
            return Ok(false);
        };
        let hash = row.get::<String, _>("secret_hash");
        self.hasher
            .verify_secret(candidate, &hash)
            .await
            .map_err(|e| DirectoryError::Store(e.to_string()))
    }

    async fn set_refresh_slot(
        &self,
        id: UserId,
        token: Option<&str>,
    ) -> Result<(), DirectoryError> {
        let result = sqlx::query("UPDATE user SET refresh_slot = ? WHERE user_id = ?")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        if result.rows_affected() == 0 {
            // MySQL reports 0 when the new value equals the old one too, so
            // only a missing row is an error here.
            let exists = self.find_by_id(id).await?.is_some();
            if !exists {
                return Err(DirectoryError::Store(format!("unknown user {id}")));
            }
        }
        Ok(())
    }

    async fn swap_refresh_slot(
        &self,
        id: UserId,
        expected: &str,
        new: &str,
    ) -> Result<bool, DirectoryError> {
        let result = sqlx::query(
            "UPDATE user SET refresh_slot = ? WHERE user_id = ? AND refresh_slot = ?",
        )
        .bind(new)
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }
}
