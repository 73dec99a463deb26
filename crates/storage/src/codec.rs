//! JSON shape of the persisted induction state blob.
//!
//! ```json
//! { "answers": { "1": [0], "2": [1, 3] }, "wrong": [], "user": "<sha256>", "passed": true }
//! ```
//!
//! Decoding never fails outright: anything that does not match the shape,
//! the question bank, or the caller's user hash reads as a fresh state.

use std::collections::{BTreeMap, BTreeSet};

use portal_core::model::{Answers, AssessmentState, QuestionBank, QuestionNumber, UserHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    #[error("malformed induction state: {0}")]
    Malformed(String),

    #[error("induction state belongs to another user")]
    UserMismatch,

    #[error("question {0} is not in the question bank")]
    UnknownQuestion(String),

    #[error("question {number} has no option {index}")]
    UnknownOption { number: QuestionNumber, index: usize },

    #[error("inconsistent induction state: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InductionBlob {
    #[serde(default)]
    answers: BTreeMap<String, Vec<usize>>,
    #[serde(default)]
    wrong: Vec<u16>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    passed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Serialize a state for the given user.
///
/// # Errors
///
/// Returns `CodecError::Malformed` if JSON serialization fails.
pub fn encode(state: &AssessmentState, user: &UserHash) -> Result<String, CodecError> {
    let blob = InductionBlob {
        answers: state
            .answers()
            .iter()
            .map(|(number, selected)| (number.to_string(), selected.iter().copied().collect()))
            .collect(),
        wrong: state
            .wrong_questions()
            .iter()
            .map(|n| n.value())
            .collect(),
        user: Some(user.as_str().to_string()),
        passed: state.is_passed(),
    };
    serde_json::to_string(&blob).map_err(|err| CodecError::Malformed(err.to_string()))
}

/// Parse a blob, reporting why it was rejected.
///
/// # Errors
///
/// Returns `CodecError` if the blob is malformed, belongs to another user,
/// or does not fit the question bank.
pub fn try_decode(
    raw: &str,
    user: &UserHash,
    bank: &QuestionBank,
) -> Result<AssessmentState, CodecError> {
    let blob: InductionBlob =
        serde_json::from_str(raw).map_err(|err| CodecError::Malformed(err.to_string()))?;

    if blob.user.as_deref() != Some(user.as_str()) {
        return Err(CodecError::UserMismatch);
    }

    let mut answers = Answers::new();
    for (key, indices) in blob.answers {
        let number = key
            .parse::<QuestionNumber>()
            .ok()
            .filter(|n| bank.contains(*n))
            .ok_or_else(|| CodecError::UnknownQuestion(key.clone()))?;
        let option_count = bank.question(number).map_or(0, |q| q.options.len());
        if let Some(index) = indices.iter().copied().find(|i| *i >= option_count) {
            return Err(CodecError::UnknownOption { number, index });
        }
        answers.insert(number, indices.into_iter().collect::<BTreeSet<_>>());
    }

    let mut wrong = Vec::with_capacity(blob.wrong.len());
    for raw_number in blob.wrong {
        let number = QuestionNumber::new(raw_number)
            .filter(|n| bank.contains(*n))
            .ok_or_else(|| CodecError::UnknownQuestion(raw_number.to_string()))?;
        wrong.push(number);
    }

    AssessmentState::from_parts(answers, wrong, blob.passed)
        .map_err(|err| CodecError::Inconsistent(err.to_string()))
}

/// Parse a blob, falling back to a fresh state when it cannot be used.
#[must_use]
pub fn decode(raw: &str, user: &UserHash, bank: &QuestionBank) -> AssessmentState {
    match try_decode(raw, user, bank) {
        Ok(state) => state,
        Err(err) => {
            tracing::info!(user = ?user, error = %err, "discarding stored induction state");
            AssessmentState::new()
        }
    }
}
