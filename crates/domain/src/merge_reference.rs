use std::collections::{BTreeMap, HashMap, HashSet};

use dictum_core::SubmissionId;
use serde::{Deserialize, Serialize};

use crate::record::DataRecord;
use crate::submission::{SubmissionInsert, SubmissionUpdate};
use crate::submitted_data::SubmittedData;

/// Provenance of a record taking part in a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeReference {
    /// Brand-new record staged in a submission.
    NewSubmittedData {
        /// Position in the entity's staged inserts.
        index: usize,
        /// Submission holding the record.
        submission_id: SubmissionId,
    },
    /// Staged edit of an existing record.
    EditSubmittedData {
        /// Position in the entity's staged updates.
        index: usize,
        /// Submission holding the edit.
        submission_id: SubmissionId,
        /// Edited record.
        system_id: String,
    },
    /// Persisted record untouched by the submission.
    SubmittedData {
        /// Storage row identifier.
        submitted_data_id: i64,
        /// Persisted record.
        system_id: String,
    },
}

impl MergeReference {
    /// Returns the system id of persisted or edited records.
    #[must_use]
    pub fn system_id(&self) -> Option<&str> {
        match self {
            Self::NewSubmittedData { .. } => None,
            Self::EditSubmittedData { system_id, .. } | Self::SubmittedData { system_id, .. } => {
                Some(system_id.as_str())
            }
        }
    }
}

/// Raw record paired with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRecordReference {
    /// Field values only.
    pub data_record: DataRecord,
    /// Where the record came from.
    pub reference: MergeReference,
}

/// Returns whether the record originates from the current submission.
///
/// Invalid origin records block the submission; invalid persisted records only
/// flag committed data as no longer valid.
#[must_use]
pub fn is_origin_submission(reference: &MergeReference) -> bool {
    match reference {
        MergeReference::NewSubmittedData { .. } | MergeReference::EditSubmittedData { .. } => true,
        MergeReference::SubmittedData { .. } => false,
    }
}

/// Strips provenance, keeping per-entity order, length and empty entries.
#[must_use]
pub fn extract_raw_records(
    references: &BTreeMap<String, Vec<DataRecordReference>>,
) -> BTreeMap<String, Vec<DataRecord>> {
    references
        .iter()
        .map(|(entity_name, entries)| {
            (
                entity_name.clone(),
                entries
                    .iter()
                    .map(|entry| entry.data_record.clone())
                    .collect(),
            )
        })
        .collect()
}

/// Snapshot of staged and persisted data for one reconciliation pass.
#[derive(Debug, Clone, Copy)]
pub struct EntityDataSources<'a> {
    /// Submission holding the staged data.
    pub submission_id: SubmissionId,
    /// Staged inserts by entity.
    pub inserts: &'a BTreeMap<String, SubmissionInsert>,
    /// Staged updates by entity.
    pub updates: &'a BTreeMap<String, Vec<SubmissionUpdate>>,
    /// Staged deletes by entity.
    pub deletes: &'a BTreeMap<String, Vec<SubmittedData>>,
    /// Persisted records of every entity touched by the pass.
    pub submitted_data: &'a [SubmittedData],
}

/// Parallel per-entity groupings produced for a validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecordGroups {
    /// Raw records handed to the schema validator.
    pub records: BTreeMap<String, Vec<DataRecord>>,
    /// The same records with provenance, index-aligned with `records`.
    pub references: BTreeMap<String, Vec<DataRecordReference>>,
}

/// Reconciles persisted records with staged changes into referenced record sets.
///
/// Persisted rows come first in input order, followed by staged inserts. Deleted
/// rows are dropped. Rows with a staged update carry the edited values. Entities
/// with staged updates or deletes stay present even when no row remains.
#[must_use]
pub fn merge_and_reference_entity_data(
    sources: EntityDataSources<'_>,
) -> BTreeMap<String, Vec<DataRecordReference>> {
    let deleted: HashSet<&str> = sources
        .deletes
        .values()
        .flatten()
        .map(|row| row.system_id.as_str())
        .collect();
    let updates_by_system_id: HashMap<&str, (usize, &SubmissionUpdate)> = sources
        .updates
        .values()
        .flat_map(|updates| updates.iter().enumerate())
        .map(|(index, update)| (update.system_id.as_str(), (index, update)))
        .collect();

    let mut references: BTreeMap<String, Vec<DataRecordReference>> = BTreeMap::new();
    for entity_name in sources.updates.keys().chain(sources.deletes.keys()) {
        references.entry(entity_name.clone()).or_default();
    }

    for row in sources.submitted_data {
        if deleted.contains(row.system_id.as_str()) {
            continue;
        }

        let entry = match updates_by_system_id.get(row.system_id.as_str()) {
            Some((index, update)) => DataRecordReference {
                data_record: apply_update(&row.data, update),
                reference: MergeReference::EditSubmittedData {
                    index: *index,
                    submission_id: sources.submission_id,
                    system_id: row.system_id.clone(),
                },
            },
            None => DataRecordReference {
                data_record: row.data.clone(),
                reference: MergeReference::SubmittedData {
                    submitted_data_id: row.id,
                    system_id: row.system_id.clone(),
                },
            },
        };

        references
            .entry(row.entity_name.clone())
            .or_default()
            .push(entry);
    }

    for (entity_name, insert) in sources.inserts {
        let entries = references.entry(entity_name.clone()).or_default();
        entries.extend(
            insert
                .records
                .iter()
                .enumerate()
                .map(|(index, record)| DataRecordReference {
                    data_record: record.clone(),
                    reference: MergeReference::NewSubmittedData {
                        index,
                        submission_id: sources.submission_id,
                    },
                }),
        );
    }

    references
}

/// Builds the raw and referenced per-entity record sets a validation pass needs.
#[must_use]
pub fn group_by_entity_with_full_context(sources: EntityDataSources<'_>) -> EntityRecordGroups {
    let references = merge_and_reference_entity_data(sources);
    EntityRecordGroups {
        records: extract_raw_records(&references),
        references,
    }
}

/// Applies a staged field-level update on top of persisted values.
///
/// Fields listed in `old` but not in `new` are removed.
#[must_use]
pub fn apply_update(data: &DataRecord, update: &SubmissionUpdate) -> DataRecord {
    let mut merged = data.clone();
    for field_name in update.old.keys() {
        if !update.new.contains_key(field_name) {
            merged.remove(field_name);
        }
    }
    for (field_name, value) in &update.new {
        merged.insert(field_name.clone(), value.clone());
    }

    merged
}
