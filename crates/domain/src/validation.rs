use std::collections::{BTreeMap, BTreeSet};

use dictum_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dictionary::SchemaDefinition;
use crate::merge_reference::{DataRecordReference, MergeReference};
use crate::record::DataRecord;
use crate::submission::SubmissionErrors;

/// Reason a record failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorReason {
    /// Required field is missing or empty.
    MissingRequiredField,
    /// Value does not match the declared type.
    InvalidValueType,
    /// Value is not part of the field's code list.
    InvalidByCodeList,
    /// Unique key value is repeated within the record set.
    InvalidByUnique,
    /// Referenced parent record does not exist.
    InvalidByForeignKey,
    /// Field is not declared by the schema.
    UnrecognizedField,
}

/// One validation problem attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValidationError {
    /// Failure category.
    pub reason: ValidationErrorReason,
    /// Offending field.
    pub field_name: String,
    /// Offending value, `null` when absent.
    pub field_value: Value,
    /// Position of the record in the list the error refers to.
    pub index: usize,
    /// Human-readable explanation.
    pub message: String,
}

/// Errors of one invalid record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRecord {
    /// Position of the record in the validated list.
    pub record_index: usize,
    /// Errors found for the record.
    pub record_errors: Vec<RecordValidationError>,
}

/// Invalid records of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityValidationDetail {
    /// Entity name.
    pub schema_name: String,
    /// Invalid records of the entity.
    pub invalid_records: Vec<InvalidRecord>,
}

/// Outcome reported by the schema validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether every record passed.
    pub valid: bool,
    /// Per-entity failures when not valid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<EntityValidationDetail>,
}

impl ValidationResult {
    /// Result for a record set without failures.
    #[must_use]
    pub fn passed() -> Self {
        Self {
            valid: true,
            details: Vec::new(),
        }
    }

    /// Result carrying failures; entities without invalid records are dropped.
    #[must_use]
    pub fn failed(details: Vec<EntityValidationDetail>) -> Self {
        let details: Vec<EntityValidationDetail> = details
            .into_iter()
            .filter(|detail| !detail.invalid_records.is_empty())
            .collect();
        Self {
            valid: details.is_empty(),
            details,
        }
    }

    /// Folds per-entity results into one result.
    #[must_use]
    pub fn combine(results: impl IntoIterator<Item = ValidationResult>) -> Self {
        Self::failed(
            results
                .into_iter()
                .filter(|result| !result.valid)
                .flat_map(|result| result.details)
                .collect(),
        )
    }
}

/// Returns the invalid records reported for one entity.
///
/// A valid result, or one without an entry for the entity, yields no records.
#[must_use]
pub fn find_invalid_record_errors_by_entity<'a>(
    result: &'a ValidationResult,
    entity_name: &str,
) -> &'a [InvalidRecord] {
    if result.valid {
        return &[];
    }

    result
        .details
        .iter()
        .find(|detail| detail.schema_name == entity_name)
        .map(|detail| detail.invalid_records.as_slice())
        .unwrap_or_default()
}

/// Indexes record errors by record position; absent positions have no entry.
#[must_use]
pub fn group_errors_by_index(
    errors: &[InvalidRecord],
) -> BTreeMap<usize, Vec<RecordValidationError>> {
    let mut grouped: BTreeMap<usize, Vec<RecordValidationError>> = BTreeMap::new();
    for invalid_record in errors {
        grouped
            .entry(invalid_record.record_index)
            .or_default()
            .extend(invalid_record.record_errors.iter().cloned());
    }

    grouped
}

/// Returns whether the sparse error index holds an entry for the position.
#[must_use]
pub fn has_error_at_index(errors: &BTreeMap<usize, Vec<RecordValidationError>>, index: usize) -> bool {
    errors.contains_key(&index)
}

/// Field found in an uploaded record but not declared by the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognizedField {
    /// Undeclared field name.
    pub field_name: String,
    /// Value supplied for it.
    pub field_value: Value,
    /// Position of the record in its upload.
    pub index: usize,
}

/// Builds the `UNRECOGNIZED_FIELD` error for an undeclared field.
#[must_use]
pub fn build_unrecognized_field_error(field: UnrecognizedField) -> RecordValidationError {
    RecordValidationError {
        reason: ValidationErrorReason::UnrecognizedField,
        message: format!("field '{}' is not declared by the schema", field.field_name),
        field_name: field.field_name,
        field_value: field.field_value,
        index: field.index,
    }
}

/// Returns an error for each field of the record the schema does not declare.
#[must_use]
pub fn find_unrecognized_fields(
    schema: &SchemaDefinition,
    index: usize,
    record: &DataRecord,
) -> Vec<RecordValidationError> {
    let declared = schema.field_names();
    record
        .iter()
        .filter(|(field_name, _)| !declared.contains(field_name.as_str()))
        .map(|(field_name, field_value)| {
            build_unrecognized_field_error(UnrecognizedField {
                field_name: field_name.clone(),
                field_value: field_value.clone(),
                index,
            })
        })
        .collect()
}

/// Validation failures traced back to their provenance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationClassification {
    /// Errors blocking the submission, indexed into staged inserts/updates.
    pub submission_errors: SubmissionErrors,
    /// Persisted records that failed validation.
    pub invalid_system_ids: BTreeSet<String>,
    /// Persisted records that passed validation.
    pub valid_system_ids: BTreeSet<String>,
}

/// Maps validator output onto the referenced record sets it was computed from.
///
/// Fails when the validator reports a record position outside the validated list.
pub fn classify_validation_result(
    result: &ValidationResult,
    references: &BTreeMap<String, Vec<DataRecordReference>>,
) -> AppResult<ValidationClassification> {
    let mut classification = ValidationClassification::default();

    for (entity_name, entries) in references {
        let errors_by_index =
            group_errors_by_index(find_invalid_record_errors_by_entity(result, entity_name));

        if let Some(out_of_range) = errors_by_index.keys().find(|index| **index >= entries.len()) {
            return Err(AppError::Internal(format!(
                "validator reported record index {} for entity '{}' holding {} records",
                out_of_range,
                entity_name,
                entries.len()
            )));
        }

        for (position, entry) in entries.iter().enumerate() {
            let record_errors = errors_by_index.get(&position);
            match &entry.reference {
                MergeReference::NewSubmittedData { index, .. } => {
                    if let Some(record_errors) = record_errors {
                        classification
                            .submission_errors
                            .inserts
                            .entry(entity_name.clone())
                            .or_default()
                            .extend(reindexed(record_errors, *index));
                    }
                }
                MergeReference::EditSubmittedData { index, .. } => {
                    if let Some(record_errors) = record_errors {
                        classification
                            .submission_errors
                            .updates
                            .entry(entity_name.clone())
                            .or_default()
                            .extend(reindexed(record_errors, *index));
                    }
                }
                MergeReference::SubmittedData { system_id, .. } => {
                    let target = if record_errors.is_some() {
                        &mut classification.invalid_system_ids
                    } else {
                        &mut classification.valid_system_ids
                    };
                    target.insert(system_id.clone());
                }
            }
        }
    }

    Ok(classification)
}

fn reindexed(
    errors: &[RecordValidationError],
    index: usize,
) -> impl Iterator<Item = RecordValidationError> + '_ {
    errors.iter().cloned().map(move |mut error| {
        error.index = index;
        error
    })
}
