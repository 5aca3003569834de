//! Submission reconciliation and validation engine.
//!
//! Everything here is pure and synchronous over caller-supplied snapshots.

#![forbid(unsafe_code)]

mod audit;
mod cascade;
mod compound;
mod dictionary;
mod merge_reference;
mod record;
mod record_merge;
mod schema_relations;
mod submission;
mod submitted_data;
mod validation;
mod view;

pub use audit::AuditAction;
pub use cascade::{
    AffectedRelation, DependentUpdateInput, build_dependent_update_instructions,
    dependent_new_values, explicit_updates, find_affected_relations,
    find_dependent_delete_filters,
};
pub use compound::{CompoundRecord, build_compound_record};
pub use dictionary::{
    Category, Dictionary, DictionaryDefinition, FieldRestrictions, ForeignKeyMapping,
    ForeignKeyRestriction, SchemaDefinition, SchemaField, SchemaRestrictions, ValueType,
};
pub use merge_reference::{
    DataRecordReference, EntityDataSources, EntityRecordGroups, MergeReference, apply_update,
    extract_raw_records, group_by_entity_with_full_context, is_origin_submission,
    merge_and_reference_entity_data,
};
pub use record::{DataRecord, canonical_record_key, canonical_value_key, records_equal};
pub use record_merge::{
    DataDiff, compute_data_diff, merge_delete_batches, merge_insert_batches, merge_record_arrays,
    merge_update_batches,
};
pub use schema_relations::{SchemaChildNode, SchemaParentNode, SchemaRelationIndex};
pub use submission::{
    Submission, SubmissionData, SubmissionErrors, SubmissionEvent, SubmissionInsert,
    SubmissionStatus, SubmissionUpdate,
};
pub use submitted_data::SubmittedData;
pub use validation::{
    EntityValidationDetail, InvalidRecord, RecordValidationError, UnrecognizedField,
    ValidationClassification, ValidationErrorReason, ValidationResult,
    build_unrecognized_field_error, classify_validation_result,
    find_invalid_record_errors_by_entity, find_unrecognized_fields, group_errors_by_index,
    has_error_at_index,
};
pub use view::{EntityFilterOptions, ViewMode, normalize_view_mode, resolve_entity_scope};
