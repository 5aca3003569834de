use async_trait::async_trait;

use dictum_core::{AppResult, CategoryId, DictionaryId, SubmissionId};
use dictum_domain::{Category, Dictionary, DictionaryDefinition, Submission, SubmittedData};

use super::inputs::{
    CommitBatch, NewCategory, NewSubmission, SubmittedDataPage, SubmittedDataQuery,
    ValidityChange,
};

/// Repository port for categories and their dictionary versions.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Returns a persisted dictionary by name and version.
    async fn find_dictionary(&self, name: &str, version: &str) -> AppResult<Option<Dictionary>>;

    /// Returns a persisted dictionary by identifier.
    async fn get_dictionary(&self, dictionary_id: DictionaryId) -> AppResult<Option<Dictionary>>;

    /// Persists a dictionary version; name and version must be unused.
    async fn save_dictionary(&self, definition: DictionaryDefinition) -> AppResult<Dictionary>;

    /// Returns a category by identifier.
    async fn find_category(&self, category_id: CategoryId) -> AppResult<Option<Category>>;

    /// Returns a category by its unique name.
    async fn find_category_by_name(&self, name: &str) -> AppResult<Option<Category>>;

    /// Lists every category ordered by identifier.
    async fn list_categories(&self) -> AppResult<Vec<Category>>;

    /// Creates a category; the name must be unused.
    async fn create_category(&self, category: NewCategory) -> AppResult<Category>;

    /// Repoints a category at another dictionary.
    async fn update_category(
        &self,
        category_id: CategoryId,
        active_dictionary_id: DictionaryId,
        default_centric_entity: Option<String>,
    ) -> AppResult<Category>;
}

/// Repository port for submissions.
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Creates an `OPEN` submission.
    async fn create_submission(&self, submission: NewSubmission) -> AppResult<Submission>;

    /// Returns a submission by identifier.
    async fn find_submission(&self, submission_id: SubmissionId) -> AppResult<Option<Submission>>;

    /// Returns the active submission of an organization in a category.
    async fn find_active_submission(
        &self,
        category_id: CategoryId,
        organization: &str,
    ) -> AppResult<Option<Submission>>;

    /// Stores staged data, errors and status, returning the stored submission.
    ///
    /// Fails with `Conflict` when the stored submission is no longer active or
    /// its version differs from `submission.version`. A successful save bumps
    /// the version.
    async fn save_submission(&self, submission: &Submission) -> AppResult<Submission>;

    /// Applies a commit batch and marks the submission `COMMITTED` atomically.
    ///
    /// Fails with `Conflict`, writing nothing, unless the stored submission is
    /// `VALID` at `expected_version` and every updated or deleted row still
    /// exists at write time.
    async fn commit_submission(&self, batch: CommitBatch) -> AppResult<()>;
}

/// Repository port for committed submitted data.
#[async_trait]
pub trait SubmittedDataRepository: Send + Sync {
    /// Lists one page of rows matching a query.
    async fn list_submitted_data(&self, query: SubmittedDataQuery) -> AppResult<SubmittedDataPage>;

    /// Returns one row by system id.
    async fn find_by_system_id(&self, system_id: &str) -> AppResult<Option<SubmittedData>>;

    /// Returns the rows of the given entities, ordered by storage id.
    async fn find_by_entities(
        &self,
        category_id: CategoryId,
        organization: Option<&str>,
        entity_names: &[String],
    ) -> AppResult<Vec<SubmittedData>>;

    /// Returns every row of a category, ordered by storage id.
    async fn find_by_category(&self, category_id: CategoryId) -> AppResult<Vec<SubmittedData>>;

    /// Applies validity changes.
    async fn update_validity(&self, changes: Vec<ValidityChange>) -> AppResult<()>;
}
