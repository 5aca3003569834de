use std::str::FromStr;

use dictum_core::AppError;
use serde::{Deserialize, Serialize};

/// Change applied to a submitted data record that is recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    /// Emitted when a committed edit changes a record.
    #[serde(rename = "UPDATE")]
    SubmittedDataUpdated,
    /// Emitted when a committed delete removes a record.
    #[serde(rename = "DELETE")]
    SubmittedDataDeleted,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmittedDataUpdated => "UPDATE",
            Self::SubmittedDataDeleted => "DELETE",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "UPDATE" => Ok(Self::SubmittedDataUpdated),
            "DELETE" => Ok(Self::SubmittedDataDeleted),
            _ => Err(AppError::Validation(format!(
                "unknown audit action '{value}'"
            ))),
        }
    }
}
