use thiserror::Error;

use crate::induction::InductionError;
use crate::model::{AssessmentStateError, QuestionBankError, RoleError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Induction(#[from] InductionError),
    #[error(transparent)]
    AssessmentState(#[from] AssessmentStateError),
    #[error(transparent)]
    QuestionBank(#[from] QuestionBankError),
    #[error(transparent)]
    Role(#[from] RoleError),
}

impl Error {
    /// Text to show the user for input mistakes, `None` for internal faults.
    #[must_use]
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Error::Induction(err) => Some(err.user_message()),
            Error::Role(err) => Some(err.user_message()),
            Error::AssessmentState(_) | Error::QuestionBank(_) => None,
        }
    }
}
