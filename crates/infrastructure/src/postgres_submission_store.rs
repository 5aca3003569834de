use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dictum_application::{
    CategoryRepository, CommitBatch, NewCategory, NewSubmission, SubmissionRepository,
    SubmittedDataPage, SubmittedDataQuery, SubmittedDataRepository, ValidityChange,
};
use dictum_core::{AppError, AppResult, CategoryId, DictionaryId, SubmissionId};
use dictum_domain::{
    Category, DataRecord, Dictionary, DictionaryDefinition, SchemaDefinition, Submission,
    SubmissionStatus, SubmittedData,
};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

mod categories;
mod commit;
mod submissions;
mod submitted_data;

/// PostgreSQL-backed store implementing every persistence port.
#[derive(Clone)]
pub struct PostgresSubmissionStore {
    pool: PgPool,
}

impl PostgresSubmissionStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DictionaryRow {
    id: i64,
    name: String,
    version: String,
    schemas: Value,
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    active_dictionary_id: i64,
    default_centric_entity: Option<String>,
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: i64,
    category_id: i64,
    dictionary_id: i64,
    organization: String,
    status: String,
    data: Value,
    errors: Value,
    created_by: String,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    version: i64,
}

#[derive(Debug, FromRow)]
struct SubmittedDataRow {
    id: i64,
    system_id: String,
    category_id: i64,
    entity_name: String,
    organization: String,
    data: Value,
    is_valid: bool,
    original_schema_id: i64,
    last_valid_schema_id: Option<i64>,
    created_by: String,
    updated_by: Option<String>,
}

const SUBMITTED_DATA_COLUMNS: &str = "id, system_id, category_id, entity_name, organization, \
     data, is_valid, original_schema_id, last_valid_schema_id, created_by, updated_by";

const SUBMISSION_COLUMNS: &str = "id, category_id, dictionary_id, organization, status, data, \
     errors, created_by, updated_by, created_at, updated_at, version";

impl TryFrom<DictionaryRow> for Dictionary {
    type Error = AppError;

    fn try_from(row: DictionaryRow) -> AppResult<Self> {
        let schemas: Vec<SchemaDefinition> =
            serde_json::from_value(row.schemas).map_err(|error| {
                AppError::Internal(format!(
                    "stored schemas of dictionary '{}' are malformed: {error}",
                    row.id
                ))
            })?;
        let definition = DictionaryDefinition::new(row.name, row.version, schemas)?;

        Ok(Dictionary::new(DictionaryId::new(row.id), definition))
    }
}

impl TryFrom<CategoryRow> for Category {
    type Error = AppError;

    fn try_from(row: CategoryRow) -> AppResult<Self> {
        Category::new(
            CategoryId::new(row.id),
            row.name,
            DictionaryId::new(row.active_dictionary_id),
            row.default_centric_entity,
        )
    }
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = AppError;

    fn try_from(row: SubmissionRow) -> AppResult<Self> {
        let malformed = |column: &str, error: serde_json::Error| {
            AppError::Internal(format!(
                "stored {column} of submission '{}' is malformed: {error}",
                row.id
            ))
        };

        Ok(Submission {
            id: SubmissionId::new(row.id),
            category_id: CategoryId::new(row.category_id),
            dictionary_id: DictionaryId::new(row.dictionary_id),
            organization: row.organization,
            status: SubmissionStatus::from_str(row.status.as_str())?,
            data: serde_json::from_value(row.data).map_err(|error| malformed("data", error))?,
            errors: serde_json::from_value(row.errors)
                .map_err(|error| malformed("errors", error))?,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

impl TryFrom<SubmittedDataRow> for SubmittedData {
    type Error = AppError;

    fn try_from(row: SubmittedDataRow) -> AppResult<Self> {
        let Value::Object(data) = row.data else {
            return Err(AppError::Internal(format!(
                "stored data of record '{}' is not an object",
                row.system_id
            )));
        };

        Ok(SubmittedData {
            id: row.id,
            system_id: row.system_id,
            category_id: CategoryId::new(row.category_id),
            entity_name: row.entity_name,
            organization: row.organization,
            data,
            is_valid: row.is_valid,
            original_schema_id: DictionaryId::new(row.original_schema_id),
            last_valid_schema_id: row.last_valid_schema_id.map(DictionaryId::new),
            created_by: row.created_by,
            updated_by: row.updated_by,
        })
    }
}

fn record_json(record: &DataRecord) -> Value {
    Value::Object(record.clone())
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(database_error) if database_error.code().as_deref() == Some("23505")
    )
}

#[async_trait]
impl CategoryRepository for PostgresSubmissionStore {
    async fn find_dictionary(&self, name: &str, version: &str) -> AppResult<Option<Dictionary>> {
        self.find_dictionary_impl(name, version).await
    }

    async fn get_dictionary(&self, dictionary_id: DictionaryId) -> AppResult<Option<Dictionary>> {
        self.get_dictionary_impl(dictionary_id).await
    }

    async fn save_dictionary(&self, definition: DictionaryDefinition) -> AppResult<Dictionary> {
        self.save_dictionary_impl(definition).await
    }

    async fn find_category(&self, category_id: CategoryId) -> AppResult<Option<Category>> {
        self.find_category_impl(category_id).await
    }

    async fn find_category_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        self.find_category_by_name_impl(name).await
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.list_categories_impl().await
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
impl SubmissionRepository for PostgresSubmissionStore {
    async fn create_submission(&self, submission: NewSubmission) -> AppResult<Submission> {
        self.create_submission_impl(submission).await
    }

    async fn find_submission(&self, submission_id: SubmissionId) -> AppResult<Option<Submission>> {
        self.find_submission_impl(submission_id).await
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
impl SubmittedDataRepository for PostgresSubmissionStore {
    async fn list_submitted_data(&self, query: SubmittedDataQuery) -> AppResult<SubmittedDataPage> {
        self.list_submitted_data_impl(query).await
    }

    async fn find_by_system_id(&self, system_id: &str) -> AppResult<Option<SubmittedData>> {
        self.find_by_system_id_impl(system_id).await
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
        self.find_by_category_impl(category_id).await
    }

    async fn update_validity(&self, changes: Vec<ValidityChange>) -> AppResult<()> {
        self.update_validity_impl(changes).await
    }
}
