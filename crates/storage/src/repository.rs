use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portal_core::model::{QuestionNumber, UserHash};
use portal_core::AttemptReport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// An opaque induction state blob with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredInduction {
    pub blob: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredInduction {
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// One scored pass through the induction assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub user: UserHash,
    pub passed: bool,
    pub attempted_questions: Vec<QuestionNumber>,
    pub incorrect_questions: Vec<QuestionNumber>,
    pub recorded_at: DateTime<Utc>,
}

impl AttemptRecord {
    #[must_use]
    pub fn from_report(user: UserHash, report: &AttemptReport, recorded_at: DateTime<Utc>) -> Self {
        Self {
            user,
            passed: report.passed,
            attempted_questions: report.attempted_questions.clone(),
            incorrect_questions: report.incorrect_questions.clone(),
            recorded_at,
        }
    }
}

/// Key-value carrier for per-user induction state.
#[async_trait]
pub trait InductionStateRepository: Send + Sync {
    /// Fetch the blob for a user, ignoring it if it expired before `now`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn load_state(
        &self,
        user: &UserHash,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredInduction>, StorageError>;

    /// Replace the blob for a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the blob cannot be stored.
    async fn save_state(
        &self,
        user: &UserHash,
        blob: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Forget a user's blob. Clearing a missing blob is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_state(&self, user: &UserHash) -> Result<(), StorageError>;
}

/// Append-only log of scored induction attempts.
#[async_trait]
pub trait InductionAttemptRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<i64, StorageError>;

    /// Attempts for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn attempts_for_user(&self, user: &UserHash) -> Result<Vec<AttemptRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    states: Arc<Mutex<HashMap<UserHash, StoredInduction>>>,
    attempts: Arc<Mutex<Vec<AttemptRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InductionStateRepository for InMemoryRepository {
    async fn load_state(
        &self,
        user: &UserHash,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredInduction>, StorageError> {
        let guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(user).filter(|s| s.is_live(now)).cloned())
    }

    async fn save_state(
        &self,
        user: &UserHash,
        blob: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            user.clone(),
            StoredInduction {
                blob: blob.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn clear_state(&self, user: &UserHash) -> Result<(), StorageError> {
        let mut guard = self
            .states
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(user);
        Ok(())
    }
}

#[async_trait]
impl InductionAttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, record: &AttemptRecord) -> Result<i64, StorageError> {
        let mut guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(record.clone());
        i64::try_from(guard.len()).map_err(|_| StorageError::Conflict)
    }

    async fn attempts_for_user(&self, user: &UserHash) -> Result<Vec<AttemptRecord>, StorageError> {
        let guard = self
            .attempts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.iter().filter(|r| &r.user == user).cloned().collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub induction_states: Arc<dyn InductionStateRepository>,
    pub induction_attempts: Arc<dyn InductionAttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let induction_states: Arc<dyn InductionStateRepository> = Arc::new(repo.clone());
        let induction_attempts: Arc<dyn InductionAttemptRepository> = Arc::new(repo);
        Self {
            induction_states,
            induction_attempts,
        }
    }
}
