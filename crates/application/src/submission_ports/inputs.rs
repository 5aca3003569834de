use dictum_core::{CategoryId, DictionaryId, SubmissionId};
use dictum_domain::{
    Category, CompoundRecord, DataRecord, Dictionary, SubmittedData, ViewMode,
};
use serde::Serialize;
use serde_json::Value;

/// Input payload for registering a dictionary version on a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDictionaryInput {
    /// Category name, created when unknown.
    pub category_name: String,
    /// Dictionary name in the schema service.
    pub dictionary_name: String,
    /// Dictionary version label in the schema service.
    pub dictionary_version: String,
    /// Entity compound views are centred on.
    pub default_centric_entity: Option<String>,
}

/// Outcome of a dictionary registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterDictionaryResult {
    /// Category after registration.
    pub category: Category,
    /// Registered dictionary.
    pub dictionary: Dictionary,
    /// Whether the category now points at a different dictionary.
    pub active_dictionary_changed: bool,
}

/// Insert payload for a new category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    /// Unique category name.
    pub name: String,
    /// Initially active dictionary.
    pub active_dictionary_id: DictionaryId,
    /// Entity compound views are centred on.
    pub default_centric_entity: Option<String>,
}

/// Insert payload for a new `OPEN` submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    /// Owning category.
    pub category_id: CategoryId,
    /// Dictionary staged data is validated against.
    pub dictionary_id: DictionaryId,
    /// Owning organization.
    pub organization: String,
    /// Subject opening the submission.
    pub created_by: String,
}

/// Records of one entity parsed from one uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadBatch {
    /// Target entity.
    pub entity_name: String,
    /// Upload name, usually the file name.
    pub batch_name: String,
    /// Parsed records.
    pub records: Vec<DataRecord>,
}

/// Input payload for staging new records.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSubmissionInput {
    /// Target category.
    pub category_id: CategoryId,
    /// Owning organization.
    pub organization: String,
    /// Uploaded batches.
    pub batches: Vec<UploadBatch>,
}

/// Replacement values for one committed record.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedDataEdit {
    /// Edited record.
    pub system_id: String,
    /// Complete new field values.
    pub data: DataRecord,
}

/// Input payload for staging edits of committed records.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSubmittedDataInput {
    /// Target category.
    pub category_id: CategoryId,
    /// Owning organization.
    pub organization: String,
    /// Entity of every edited record.
    pub entity_name: String,
    /// Edits to stage.
    pub edits: Vec<SubmittedDataEdit>,
}

/// Input payload for staging the removal of a committed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSubmittedDataInput {
    /// Target category.
    pub category_id: CategoryId,
    /// Owning organization.
    pub organization: String,
    /// Record to remove along with its dependents.
    pub system_id: String,
}

/// Kind of staged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedAction {
    /// Staged new records.
    Inserts,
    /// Staged edits.
    Updates,
    /// Staged removals.
    Deletes,
}

/// Input payload for unstaging records from the active submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveStagedRecordsInput {
    /// Target submission.
    pub submission_id: SubmissionId,
    /// Category the submission must belong to.
    pub category_id: CategoryId,
    /// Entity whose staged changes are removed.
    pub entity_name: String,
    /// Kind of staged change to remove.
    pub action: StagedAction,
    /// Position to remove; every staged change of the kind when absent.
    pub index: Option<usize>,
}

/// New submitted data row produced by a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmittedData {
    /// Minted system id.
    pub system_id: String,
    /// Entity the record belongs to.
    pub entity_name: String,
    /// Owning organization.
    pub organization: String,
    /// Field values.
    pub data: DataRecord,
}

/// Committed edit of an existing submitted data row.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedDataChange {
    /// Edited record.
    pub system_id: String,
    /// Complete field values after the edit.
    pub data: DataRecord,
}

/// Validity flag change of a persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityChange {
    /// Affected record.
    pub system_id: String,
    /// New validity.
    pub is_valid: bool,
    /// Dictionary version the record last passed; kept unchanged when `None`.
    pub last_valid_schema_id: Option<DictionaryId>,
}

/// Everything a commit writes, applied atomically by the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitBatch {
    /// Committed submission.
    pub submission_id: SubmissionId,
    /// Submission version the batch was built from.
    pub expected_version: i64,
    /// Owning category.
    pub category_id: CategoryId,
    /// Dictionary the batch was validated against.
    pub dictionary_id: DictionaryId,
    /// Subject performing the commit.
    pub committed_by: String,
    /// Rows to create.
    pub inserts: Vec<NewSubmittedData>,
    /// Rows to rewrite.
    pub updates: Vec<SubmittedDataChange>,
    /// System ids of rows to remove.
    pub deletes: Vec<String>,
    /// Validity changes of untouched rows validated alongside the batch.
    pub validity: Vec<ValidityChange>,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSubmissionResult {
    /// Committed submission.
    pub submission_id: SubmissionId,
    /// System ids minted for new records.
    pub inserted_system_ids: Vec<String>,
    /// Number of edited records.
    pub updated: usize,
    /// Number of removed records.
    pub deleted: usize,
}

/// Storage query for a page of submitted data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedDataQuery {
    /// Category scope.
    pub category_id: CategoryId,
    /// Organization scope, every organization when absent.
    pub organization: Option<String>,
    /// Entity scope, every entity when empty.
    pub entity_names: Vec<String>,
    /// One-based page number.
    pub page: u32,
    /// Rows per page.
    pub page_size: u32,
}

impl SubmittedDataQuery {
    /// Number of rows skipped before the page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of submitted data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmittedDataPage {
    /// Rows ordered by storage id.
    pub records: Vec<SubmittedData>,
    /// Rows matching the query across every page.
    pub total_records: u64,
}

/// Input payload for submitted data listings.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSubmittedDataInput {
    /// Category scope.
    pub category_id: CategoryId,
    /// Organization scope, every organization when absent.
    pub organization: Option<String>,
    /// Raw view parameter; unrecognized values fall back to the flat view.
    pub view: Value,
    /// Requested entity names for flat views.
    pub entity_names: Vec<String>,
    /// One-based page number.
    pub page: u32,
    /// Rows per page.
    pub page_size: u32,
}

/// Listed records shaped by view mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubmittedDataView {
    /// One entry per record.
    Flat(Vec<SubmittedData>),
    /// Centric entity records with nested dependents.
    Compound(Vec<CompoundRecord>),
}

/// Paginated submitted data listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedDataListing {
    /// Applied view mode.
    pub view: ViewMode,
    /// Listed records.
    pub records: SubmittedDataView,
    /// One-based page number.
    pub page: u32,
    /// Rows per page.
    pub page_size: u32,
    /// Rows matching the query across every page.
    pub total_records: u64,
    /// Number of pages.
    pub total_pages: u64,
}

/// Outcome of revalidating a category's committed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevalidationSummary {
    /// Revalidated category.
    pub category_id: CategoryId,
    /// Dictionary the data was validated against.
    pub dictionary_id: DictionaryId,
    /// Records passing validation.
    pub valid: usize,
    /// Records failing validation.
    pub invalid: usize,
}
