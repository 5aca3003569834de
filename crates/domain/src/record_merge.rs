use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::record::{DataRecord, canonical_record_key};
use crate::submission::{SubmissionInsert, SubmissionUpdate};
use crate::submitted_data::SubmittedData;

/// Combines two insert batches per entity, dropping structurally identical records.
///
/// The first occurrence wins in left-to-right, `left`-then-`right` order. The
/// batch name comes from the first side that contributed a record for the
/// entity; `left` wins ties.
#[must_use]
pub fn merge_insert_batches(
    left: &BTreeMap<String, SubmissionInsert>,
    right: &BTreeMap<String, SubmissionInsert>,
) -> BTreeMap<String, SubmissionInsert> {
    let entity_names: BTreeSet<&String> = left.keys().chain(right.keys()).collect();

    entity_names
        .into_iter()
        .map(|entity_name| {
            let left_insert = left.get(entity_name);
            let right_insert = right.get(entity_name);

            let batch_name = [left_insert, right_insert]
                .into_iter()
                .flatten()
                .find(|insert| !insert.records.is_empty())
                .or(left_insert)
                .or(right_insert)
                .map(|insert| insert.batch_name.clone())
                .unwrap_or_default();

            let mut seen = HashSet::new();
            let records = left_insert
                .into_iter()
                .chain(right_insert)
                .flat_map(|insert| insert.records.iter())
                .filter(|record| seen.insert(canonical_record_key(record)))
                .cloned()
                .collect();

            (
                entity_name.clone(),
                SubmissionInsert {
                    batch_name,
                    records,
                },
            )
        })
        .collect()
}

/// Concatenates per-key arrays of two optional mappings without deduplication.
#[must_use]
pub fn merge_record_arrays<K, V>(
    left: Option<&BTreeMap<K, Vec<V>>>,
    right: Option<&BTreeMap<K, Vec<V>>>,
) -> BTreeMap<K, Vec<V>>
where
    K: Ord + Clone,
    V: Clone,
{
    let mut merged: BTreeMap<K, Vec<V>> = BTreeMap::new();
    for mapping in [left, right].into_iter().flatten() {
        for (key, values) in mapping {
            merged
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    merged
}

/// Combines staged updates per entity; a later update for a system id replaces the earlier one.
#[must_use]
pub fn merge_update_batches(
    left: &BTreeMap<String, Vec<SubmissionUpdate>>,
    right: &BTreeMap<String, Vec<SubmissionUpdate>>,
) -> BTreeMap<String, Vec<SubmissionUpdate>> {
    let mut merged = left.clone();
    for (entity_name, updates) in right {
        let entity_updates = merged.entry(entity_name.clone()).or_default();
        for update in updates {
            match entity_updates
                .iter_mut()
                .find(|existing| existing.system_id == update.system_id)
            {
                Some(existing) => *existing = update.clone(),
                None => entity_updates.push(update.clone()),
            }
        }
    }

    merged
}

/// Combines staged deletes per entity, keeping the first entry per system id.
#[must_use]
pub fn merge_delete_batches(
    left: &BTreeMap<String, Vec<SubmittedData>>,
    right: &BTreeMap<String, Vec<SubmittedData>>,
) -> BTreeMap<String, Vec<SubmittedData>> {
    let mut merged = left.clone();
    for (entity_name, deletes) in right {
        let entity_deletes = merged.entry(entity_name.clone()).or_default();
        for row in deletes {
            if !entity_deletes
                .iter()
                .any(|existing| existing.system_id == row.system_id)
            {
                entity_deletes.push(row.clone());
            }
        }
    }

    merged
}

/// Field-level difference between two versions of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDiff {
    /// Prior values of changed fields present in the old record.
    pub old: DataRecord,
    /// Replacement values of changed fields present in the new record.
    pub new: DataRecord,
}

impl DataDiff {
    /// Returns whether the records are identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.old.is_empty() && self.new.is_empty()
    }
}

/// Computes the fields whose values differ between two records.
///
/// A field missing on one side counts as changed and only appears on the side
/// that holds it.
#[must_use]
pub fn compute_data_diff(old: &DataRecord, new: &DataRecord) -> DataDiff {
    let field_names: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    let mut diff = DataDiff::default();

    for field_name in field_names {
        let old_value = old.get(field_name);
        let new_value = new.get(field_name);
        if old_value == new_value {
            continue;
        }

        if let Some(value) = old_value {
            diff.old.insert(field_name.clone(), value.clone());
        }
        if let Some(value) = new_value {
            diff.new.insert(field_name.clone(), value.clone());
        }
    }

    diff
}
