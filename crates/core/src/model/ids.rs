use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

// ─── Question Number ───────────────────────────────────────────────────────────

/// 1-based position of a question in the induction question bank.
///
/// The upper bound depends on the bank in use, so it is checked by
/// [`crate::model::QuestionBank::question`] rather than here.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct QuestionNumber(u16);

impl QuestionNumber {
    /// The first question of any bank.
    pub const FIRST: Self = Self(1);

    /// Creates a question number, rejecting zero.
    #[must_use]
    pub fn new(value: u16) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Returns the underlying 1-based value.
    #[must_use]
    pub fn value(self) -> u16 {
        self.0
    }

    /// Zero-based index into the bank's question list.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// The question immediately after this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// The question immediately before this one, if any.
    #[must_use]
    pub fn prev(self) -> Option<Self> {
        Self::new(self.0 - 1)
    }
}

impl TryFrom<u16> for QuestionNumber {
    type Error = ParseQuestionNumberError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| ParseQuestionNumberError {
            raw: value.to_string(),
        })
    }
}

impl From<QuestionNumber> for u16 {
    fn from(value: QuestionNumber) -> Self {
        value.0
    }
}

impl fmt::Debug for QuestionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionNumber({})", self.0)
    }
}

impl fmt::Display for QuestionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for parsing a question number from routing or form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseQuestionNumberError {
    raw: String,
}

impl fmt::Display for ParseQuestionNumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid question number: {:?}", self.raw)
    }
}

impl std::error::Error for ParseQuestionNumberError {}

impl FromStr for QuestionNumber {
    type Err = ParseQuestionNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u16>()
            .ok()
            .and_then(QuestionNumber::new)
            .ok_or_else(|| ParseQuestionNumberError { raw: s.to_string() })
    }
}

// ─── User Hash ─────────────────────────────────────────────────────────────────

/// One-way key that scopes persisted induction state to a single user.
///
/// Lowercase hex SHA-256 of the signed-in user's email. Never used for
/// authorization.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserHash(String);

impl UserHash {
    /// Hash an email address into a user key.
    #[must_use]
    pub fn from_email(email: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(email.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already-computed digest, e.g. one read back from storage.
    #[must_use]
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps log lines readable.
        let end = self.0.char_indices().nth(12).map_or(self.0.len(), |(i, _)| i);
        write!(f, "UserHash({})", &self.0[..end])
    }
}

impl fmt::Display for UserHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
