use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dictum_core::{AppError, AppResult, CategoryId, DictionaryId, SubmissionId};
use serde::{Deserialize, Serialize};

use crate::record::DataRecord;
use crate::record_merge::{
    merge_delete_batches, merge_insert_batches, merge_record_arrays, merge_update_batches,
};
use crate::submitted_data::SubmittedData;
use crate::validation::RecordValidationError;

/// Lifecycle status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Staged data has not been validated yet.
    Open,
    /// Last validation pass found no errors.
    Valid,
    /// Last validation pass found at least one error.
    Invalid,
    /// Abandoned by the submitter. Terminal.
    Closed,
    /// Applied to submitted data. Terminal.
    Committed,
}

/// Event driving a submission status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionEvent {
    /// New data was merged into the staged data.
    Staged,
    /// A validation pass finished.
    Validated {
        /// Whether any entity reported an indexed error.
        has_errors: bool,
    },
    /// The submitter abandoned the submission.
    Closed,
    /// Staged data was applied to submitted data.
    Committed,
}

impl SubmissionStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Closed => "CLOSED",
            Self::Committed => "COMMITTED",
        }
    }

    /// Returns whether a submission in this status may be closed.
    #[must_use]
    pub fn can_close_from(self) -> bool {
        matches!(self, Self::Open | Self::Valid | Self::Invalid)
    }

    /// Returns whether the submission is still mutable.
    #[must_use]
    pub fn is_active(self) -> bool {
        self.can_close_from()
    }

    /// Returns whether a submission in this status may be committed.
    #[must_use]
    pub fn can_commit(self) -> bool {
        self == Self::Valid
    }

    /// Status reached after a validation pass.
    #[must_use]
    pub fn from_validation(has_errors: bool) -> Self {
        if has_errors {
            Self::Invalid
        } else {
            Self::Valid
        }
    }

    /// Applies an event, rejecting transitions out of terminal states.
    pub fn transition(self, event: SubmissionEvent) -> AppResult<Self> {
        match event {
            SubmissionEvent::Staged if self.is_active() => Ok(Self::Open),
            SubmissionEvent::Validated { has_errors } if self.is_active() => {
                Ok(Self::from_validation(has_errors))
            }
            SubmissionEvent::Closed if self.can_close_from() => Ok(Self::Closed),
            SubmissionEvent::Committed if self.can_commit() => Ok(Self::Committed),
            _ => Err(AppError::Conflict(format!(
                "submission in status '{}' cannot accept {:?}",
                self.as_str(),
                event
            ))),
        }
    }
}

impl FromStr for SubmissionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "OPEN" => Ok(Self::Open),
            "VALID" => Ok(Self::Valid),
            "INVALID" => Ok(Self::Invalid),
            "CLOSED" => Ok(Self::Closed),
            "COMMITTED" => Ok(Self::Committed),
            _ => Err(AppError::Validation(format!(
                "unknown submission status '{value}'"
            ))),
        }
    }
}

/// Staged new records for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInsert {
    /// Name of the upload batch that introduced the records.
    pub batch_name: String,
    /// Staged records.
    pub records: Vec<DataRecord>,
}

/// Staged change to one submitted data record, restricted to changed fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionUpdate {
    /// Target record.
    pub system_id: String,
    /// Previous values of the changed fields.
    pub old: DataRecord,
    /// Replacement values of the changed fields.
    pub new: DataRecord,
    /// Fields filled in by a cascade from a referenced record instead of an edit.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub cascaded_fields: BTreeSet<String>,
}

impl SubmissionUpdate {
    /// Returns a copy without cascade-filled fields, `None` when nothing else remains.
    #[must_use]
    pub fn explicit_part(&self) -> Option<SubmissionUpdate> {
        let keep = |field_name: &String| !self.cascaded_fields.contains(field_name);
        let old: DataRecord = self
            .old
            .iter()
            .filter(|(field_name, _)| keep(field_name))
            .map(|(field_name, value)| (field_name.clone(), value.clone()))
            .collect();
        let new: DataRecord = self
            .new
            .iter()
            .filter(|(field_name, _)| keep(field_name))
            .map(|(field_name, value)| (field_name.clone(), value.clone()))
            .collect();
        if old.is_empty() && new.is_empty() {
            return None;
        }

        Some(SubmissionUpdate {
            system_id: self.system_id.clone(),
            old,
            new,
            cascaded_fields: BTreeSet::new(),
        })
    }
}

/// Staged changes of a submission, grouped by entity name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionData {
    /// New records.
    #[serde(default)]
    pub inserts: BTreeMap<String, SubmissionInsert>,
    /// Edits to committed records.
    #[serde(default)]
    pub updates: BTreeMap<String, Vec<SubmissionUpdate>>,
    /// Committed records scheduled for removal.
    #[serde(default)]
    pub deletes: BTreeMap<String, Vec<SubmittedData>>,
}

impl SubmissionData {
    /// Returns whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserts.values().all(|insert| insert.records.is_empty())
            && self.updates.values().all(Vec::is_empty)
            && self.deletes.values().all(Vec::is_empty)
    }

    /// Merges newly staged data after the existing staged data.
    #[must_use]
    pub fn merge(&self, incoming: &SubmissionData) -> SubmissionData {
        SubmissionData {
            inserts: merge_insert_batches(&self.inserts, &incoming.inserts),
            updates: merge_update_batches(&self.updates, &incoming.updates),
            deletes: merge_delete_batches(&self.deletes, &incoming.deletes),
        }
    }

    /// Drops entities left without staged records.
    pub fn prune_empty(&mut self) {
        self.inserts.retain(|_, insert| !insert.records.is_empty());
        self.updates.retain(|_, updates| !updates.is_empty());
        self.deletes.retain(|_, deletes| !deletes.is_empty());
    }
}

/// Per-entity validation errors attached to staged data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionErrors {
    /// Errors indexed into the entity's staged inserts.
    #[serde(default)]
    pub inserts: BTreeMap<String, Vec<RecordValidationError>>,
    /// Errors indexed into the entity's staged updates.
    #[serde(default)]
    pub updates: BTreeMap<String, Vec<RecordValidationError>>,
}

impl SubmissionErrors {
    /// Returns whether at least one entity has at least one error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.inserts.values().any(|errors| !errors.is_empty())
            || self.updates.values().any(|errors| !errors.is_empty())
    }

    /// Concatenates both error sets per entity.
    #[must_use]
    pub fn merge(&self, other: &SubmissionErrors) -> SubmissionErrors {
        SubmissionErrors {
            inserts: merge_record_arrays(Some(&self.inserts), Some(&other.inserts)),
            updates: merge_record_arrays(Some(&self.updates), Some(&other.updates)),
        }
    }
}

/// Staged, not yet committed batch of changes for one category and organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Submission identifier.
    pub id: SubmissionId,
    /// Owning category.
    pub category_id: CategoryId,
    /// Dictionary version the staged data was validated against.
    pub dictionary_id: DictionaryId,
    /// Owning organization.
    pub organization: String,
    /// Lifecycle status.
    pub status: SubmissionStatus,
    /// Staged changes.
    pub data: SubmissionData,
    /// Errors from the latest validation pass.
    pub errors: SubmissionErrors,
    /// Subject that opened the submission.
    pub created_by: String,
    /// Subject that last changed the submission.
    pub updated_by: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last change timestamp.
    pub updated_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, bumped by every stored change.
    pub version: i64,
}

impl Submission {
    /// Fails unless the submission is still mutable.
    pub fn ensure_active(&self) -> AppResult<()> {
        if !self.status.is_active() {
            return Err(AppError::Conflict(format!(
                "submission '{}' is '{}' and can no longer change",
                self.id,
                self.status.as_str()
            )));
        }

        Ok(())
    }

    /// Fails unless the submission belongs to the category.
    pub fn ensure_category(&self, category_id: CategoryId) -> AppResult<()> {
        if self.category_id != category_id {
            return Err(AppError::NotFound(format!(
                "submission '{}' does not exist in category '{}'",
                self.id, category_id
            )));
        }

        Ok(())
    }
}
