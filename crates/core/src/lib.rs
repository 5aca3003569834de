//! Shared primitives for all Rust crates in Dictum.

#![forbid(unsafe_code)]

/// Typed identifiers for persisted aggregates.
pub mod ids;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ids::{CategoryId, DictionaryId, SubmissionId};

/// Result type used across Dictum crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or invalid caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation conflicts with the current state of a resource.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Structurally malformed upload or payload content.
    #[error("parse error: {0}")]
    Parse(String),

    /// Optional capability that has not been configured.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// External dependency could not be reached.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
