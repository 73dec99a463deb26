use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portal_core::model::UserHash;
use sqlx::Row;

use crate::repository::{InductionStateRepository, StorageError, StoredInduction};

use super::SqliteRepository;

#[async_trait]
impl InductionStateRepository for SqliteRepository {
    async fn load_state(
        &self,
        user: &UserHash,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredInduction>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT blob, expires_at
            FROM induction_state
            WHERE user_hash = ?1
            ",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let blob: String = row
            .try_get("blob")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        let stored = StoredInduction { blob, expires_at };
        Ok(stored.is_live(now).then_some(stored))
    }

    async fn save_state(
        &self,
        user: &UserHash,
        blob: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO induction_state (user_hash, blob, expires_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_hash) DO UPDATE SET
                blob = excluded.blob,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user.as_str())
        .bind(blob)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn clear_state(&self, user: &UserHash) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM induction_state WHERE user_hash = ?1")
            .bind(user.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}
