//! Shared error types for the services crate.

use thiserror::Error;

use portal_core::InductionError;
use portal_core::model::{QuestionBankError, RoleError};
use storage::codec::CodecError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors from calls to external services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },
    #[error("{service} request failed with status {status}")]
    HttpStatus {
        service: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("{service} returned an unexpected response: {reason}")]
    UnexpectedResponse {
        service: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// Errors emitted by `InductionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InductionServiceError {
    #[error(transparent)]
    Induction(#[from] InductionError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl InductionServiceError {
    /// User-facing message for recoverable validation errors.
    #[must_use]
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            InductionServiceError::Induction(err) => Some(err.user_message()),
            _ => None,
        }
    }
}

/// Errors emitted by `RoleChangeService` before any role is mutated.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RoleChangeError {
    #[error(transparent)]
    Validation(#[from] RoleError),
    #[error("requesting user may not change roles for {target} in {agreement_id}")]
    PermissionDenied {
        agreement_id: String,
        target: String,
    },
    #[error("permissions check failed: {0}")]
    PermissionCheck(#[source] ClientError),
}

/// Errors from reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid URL in {var}: {raw}")]
    InvalidUrl { var: &'static str, raw: String },
    #[error("invalid number in {var}: {raw}")]
    InvalidNumber { var: &'static str, raw: String },
    #[error("could not read question bank {path}: {source}")]
    QuestionBankIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    QuestionBank(#[from] QuestionBankError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
