use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dictum_application::{
    CategoryRepository, CommitBatch, NewCategory, NewSubmission, SubmissionRepository,
    SubmittedDataPage, SubmittedDataQuery, SubmittedDataRepository, ValidityChange,
};
use dictum_core::{AppError, AppResult, CategoryId, DictionaryId, SubmissionId};
use dictum_domain::{
    Category, Dictionary, DictionaryDefinition, Submission, SubmissionData, SubmissionErrors,
    SubmissionStatus, SubmittedData,
};
use tokio::sync::RwLock;

mod categories;
mod submissions;
mod submitted_data;

/// In-memory store implementing every persistence port.
///
/// Commits take the submission and submitted data locks in that order.
#[derive(Debug, Default)]
pub struct InMemorySubmissionStore {
    dictionaries: RwLock<BTreeMap<DictionaryId, Dictionary>>,
    categories: RwLock<BTreeMap<CategoryId, Category>>,
    submissions: RwLock<BTreeMap<SubmissionId, Submission>>,
    submitted_data: RwLock<BTreeMap<i64, SubmittedData>>,
    sequence: AtomicI64,
}

impl InMemorySubmissionStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl CategoryRepository for InMemorySubmissionStore {
    async fn find_dictionary(&self, name: &str, version: &str) -> AppResult<Option<Dictionary>> {
        self.find_dictionary_impl(name, version).await
    }

    async fn get_dictionary(&self, dictionary_id: DictionaryId) -> AppResult<Option<Dictionary>> {
        Ok(self.dictionaries.read().await.get(&dictionary_id).cloned())
    }

    async fn save_dictionary(&self, definition: DictionaryDefinition) -> AppResult<Dictionary> {
        self.save_dictionary_impl(definition).await
    }

    async fn find_category(&self, category_id: CategoryId) -> AppResult<Option<Category>> {
        Ok(self.categories.read().await.get(&category_id).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        self.find_category_by_name_impl(name).await
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        Ok(self.categories.read().await.values().cloned().collect())
    }

    async fn create_category(&self, category: NewCategory) -> AppResult<Category> {
        self.create_category_impl(category).await
    }

    async fn update_category(
        &self,
        category_id: CategoryId,
        active_dictionary_id: DictionaryId,
        default_centric_entity: Option<String>,
    ) -> AppResult<Category> {
        self.update_category_impl(category_id, active_dictionary_id, default_centric_entity)
            .await
    }
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissionStore {
    async fn create_submission(&self, submission: NewSubmission) -> AppResult<Submission> {
        self.create_submission_impl(submission).await
    }

    async fn find_submission(&self, submission_id: SubmissionId) -> AppResult<Option<Submission>> {
        Ok(self.submissions.read().await.get(&submission_id).cloned())
    }

    async fn find_active_submission(
        &self,
        category_id: CategoryId,
        organization: &str,
    ) -> AppResult<Option<Submission>> {
        self.find_active_submission_impl(category_id, organization)
            .await
    }

    async fn save_submission(&self, submission: &Submission) -> AppResult<Submission> {
        self.save_submission_impl(submission).await
    }

    async fn commit_submission(&self, batch: CommitBatch) -> AppResult<()> {
        self.commit_submission_impl(batch).await
    }
}

#[async_trait]
impl SubmittedDataRepository for InMemorySubmissionStore {
    async fn list_submitted_data(&self, query: SubmittedDataQuery) -> AppResult<SubmittedDataPage> {
        self.list_submitted_data_impl(query).await
    }

    async fn find_by_system_id(&self, system_id: &str) -> AppResult<Option<SubmittedData>> {
        Ok(self
            .submitted_data
            .read()
            .await
            .values()
            .find(|row| row.system_id == system_id)
            .cloned())
    }

    async fn find_by_entities(
        &self,
        category_id: CategoryId,
        organization: Option<&str>,
        entity_names: &[String],
    ) -> AppResult<Vec<SubmittedData>> {
        self.find_by_entities_impl(category_id, organization, entity_names)
            .await
    }

    async fn find_by_category(&self, category_id: CategoryId) -> AppResult<Vec<SubmittedData>> {
        Ok(self
            .submitted_data
            .read()
            .await
            .values()
            .filter(|row| row.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn update_validity(&self, changes: Vec<ValidityChange>) -> AppResult<()> {
        let mut rows = self.submitted_data.write().await;
        submitted_data::apply_validity(&mut rows, &changes);
        Ok(())
    }
}
