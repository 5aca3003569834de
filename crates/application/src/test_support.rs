use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dictum_core::{AppError, AppResult, CategoryId, DictionaryId, SubmissionId};
use dictum_domain::{
    Category, DataRecord, Dictionary, DictionaryDefinition, EntityValidationDetail,
    FieldRestrictions, ForeignKeyMapping, ForeignKeyRestriction, InvalidRecord,
    RecordValidationError, SchemaDefinition, SchemaField, SchemaRestrictions, Submission,
    SubmissionData, SubmissionErrors, SubmissionStatus, SubmittedData, ValidationErrorReason,
    ValidationResult, ValueType, canonical_value_key,
};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    AuditEvent, AuditRepository, CategoryRepository, CommitBatch, NewCategory, NewSubmission,
    SchemaProvider, SchemaValidator, SubmissionRepository, SubmittedDataPage, SubmittedDataQuery,
    SubmittedDataRepository, SystemIdGenerator, ValidityChange,
};

pub(crate) fn record(value: Value) -> DataRecord {
    match value {
        Value::Object(object) => object,
        _ => unreachable!(),
    }
}

fn field(name: &str, required: bool) -> SchemaField {
    SchemaField {
        name: name.to_owned(),
        description: None,
        value_type: ValueType::String,
        is_array: false,
        restrictions: FieldRestrictions {
            required,
            code_list: None,
        },
    }
}

fn foreign_key(parent: &str, field_name: &str) -> Vec<ForeignKeyRestriction> {
    vec![ForeignKeyRestriction {
        schema: parent.to_owned(),
        mappings: vec![ForeignKeyMapping {
            local: field_name.to_owned(),
            foreign: field_name.to_owned(),
        }],
    }]
}

/// person <- employee <- payslip, all keyed by string identifiers.
pub(crate) fn hr_dictionary(version: &str) -> DictionaryDefinition {
    let schemas = vec![
        SchemaDefinition {
            name: "person".to_owned(),
            description: None,
            fields: vec![field("personId", true), field("name", false)],
            restrictions: SchemaRestrictions {
                foreign_key: Vec::new(),
                unique_key: vec!["personId".to_owned()],
            },
        },
        SchemaDefinition {
            name: "employee".to_owned(),
            description: None,
            fields: vec![field("employeeId", true), field("personId", true)],
            restrictions: SchemaRestrictions {
                foreign_key: foreign_key("person", "personId"),
                unique_key: vec!["employeeId".to_owned()],
            },
        },
        SchemaDefinition {
            name: "payslip".to_owned(),
            description: None,
            fields: vec![field("payslipId", true), field("employeeId", true)],
            restrictions: SchemaRestrictions {
                foreign_key: foreign_key("employee", "employeeId"),
                unique_key: Vec::new(),
            },
        },
    ];

    DictionaryDefinition::new("hr", version, schemas).unwrap_or_else(|_| unreachable!())
}

#[derive(Default)]
struct StoreState {
    dictionaries: Vec<Dictionary>,
    categories: Vec<Category>,
    submissions: BTreeMap<SubmissionId, Submission>,
    submitted_data: Vec<SubmittedData>,
    next_id: i64,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Fake persistence for every repository port.
#[derive(Default)]
pub(crate) struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub(crate) async fn seed_row(
        &self,
        category_id: CategoryId,
        dictionary_id: DictionaryId,
        system_id: &str,
        entity_name: &str,
        data: Value,
    ) {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.submitted_data.push(SubmittedData {
            id,
            system_id: system_id.to_owned(),
            category_id,
            entity_name: entity_name.to_owned(),
            organization: "org".to_owned(),
            data: record(data),
            is_valid: true,
            original_schema_id: dictionary_id,
            last_valid_schema_id: Some(dictionary_id),
            created_by: "seed".to_owned(),
            updated_by: None,
        });
    }

    pub(crate) async fn rows(&self) -> Vec<SubmittedData> {
        self.state.lock().await.submitted_data.clone()
    }

    pub(crate) async fn remove_row(&self, system_id: &str) {
        self.state
            .lock()
            .await
            .submitted_data
            .retain(|row| row.system_id != system_id);
    }
}

#[async_trait]
impl CategoryRepository for FakeStore {
    async fn find_dictionary(&self, name: &str, version: &str) -> AppResult<Option<Dictionary>> {
        let state = self.state.lock().await;
        Ok(state
            .dictionaries
            .iter()
            .find(|dictionary| dictionary.name() == name && dictionary.version() == version)
            .cloned())
    }

    async fn get_dictionary(&self, dictionary_id: DictionaryId) -> AppResult<Option<Dictionary>> {
        let state = self.state.lock().await;
        Ok(state
            .dictionaries
            .iter()
            .find(|dictionary| dictionary.id() == dictionary_id)
            .cloned())
    }

    async fn save_dictionary(&self, definition: DictionaryDefinition) -> AppResult<Dictionary> {
        let mut state = self.state.lock().await;
        let id = DictionaryId::new(state.next_id());
        let dictionary = Dictionary::new(id, definition);
        state.dictionaries.push(dictionary.clone());
        Ok(dictionary)
    }

    async fn find_category(&self, category_id: CategoryId) -> AppResult<Option<Category>> {
        let state = self.state.lock().await;
        Ok(state
            .categories
            .iter()
            .find(|category| category.id() == category_id)
            .cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        let state = self.state.lock().await;
        Ok(state
            .categories
            .iter()
            .find(|category| category.name().as_str() == name)
            .cloned())
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        Ok(self.state.lock().await.categories.clone())
    }

    async fn create_category(&self, category: NewCategory) -> AppResult<Category> {
        let mut state = self.state.lock().await;
        let id = CategoryId::new(state.next_id());
        let created = Category::new(
            id,
            category.name,
            category.active_dictionary_id,
            category.default_centric_entity,
        )?;
        state.categories.push(created.clone());
        Ok(created)
    }

    async fn update_category(
        &self,
        category_id: CategoryId,
        active_dictionary_id: DictionaryId,
        default_centric_entity: Option<String>,
    ) -> AppResult<Category> {
        let mut state = self.state.lock().await;
        let Some(category) = state
            .categories
            .iter_mut()
            .find(|category| category.id() == category_id)
        else {
            return Err(AppError::NotFound(format!("category '{category_id}'")));
        };

        *category = Category::new(
            category_id,
            category.name().as_str(),
            active_dictionary_id,
            default_centric_entity,
        )?;
        Ok(category.clone())
    }
}

#[async_trait]
impl SubmissionRepository for FakeStore {
    async fn create_submission(&self, submission: NewSubmission) -> AppResult<Submission> {
        let mut state = self.state.lock().await;
        let id = SubmissionId::new(state.next_id());
        let created = Submission {
            id,
            category_id: submission.category_id,
            dictionary_id: submission.dictionary_id,
            organization: submission.organization,
            status: SubmissionStatus::Open,
            data: SubmissionData::default(),
            errors: SubmissionErrors::default(),
            created_by: submission.created_by,
            updated_by: None,
            created_at: Utc::now(),
            updated_at: None,
            version: 0,
        };
        state.submissions.insert(id, created.clone());
        Ok(created)
    }

    async fn find_submission(&self, submission_id: SubmissionId) -> AppResult<Option<Submission>> {
        Ok(self.state.lock().await.submissions.get(&submission_id).cloned())
    }

    async fn find_active_submission(
        &self,
        category_id: CategoryId,
        organization: &str,
    ) -> AppResult<Option<Submission>> {
        let state = self.state.lock().await;
        Ok(state
            .submissions
            .values()
            .find(|submission| {
                submission.category_id == category_id
                    && submission.organization == organization
                    && submission.status.is_active()
            })
            .cloned())
    }

    async fn save_submission(&self, submission: &Submission) -> AppResult<Submission> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.submissions.get_mut(&submission.id) else {
            return Err(AppError::NotFound(format!("submission '{}'", submission.id)));
        };
        if !stored.status.is_active() || stored.version != submission.version {
            return Err(AppError::Conflict(format!("submission '{}'", submission.id)));
        }

        *stored = submission.clone();
        stored.version += 1;
        Ok(stored.clone())
    }

    async fn commit_submission(&self, batch: CommitBatch) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let current = state
            .submissions
            .get(&batch.submission_id)
            .map(|submission| (submission.status, submission.version));
        if current != Some((SubmissionStatus::Valid, batch.expected_version)) {
            return Err(AppError::Conflict(format!(
                "submission '{}' is not valid at version {}",
                batch.submission_id, batch.expected_version
            )));
        }
        if let Some(missing) = batch
            .updates
            .iter()
            .map(|change| change.system_id.as_str())
            .chain(batch.deletes.iter().map(String::as_str))
            .find(|system_id| !state.submitted_data.iter().any(|row| row.system_id == *system_id))
        {
            return Err(AppError::Conflict(format!("record '{missing}' no longer exists")));
        }

        let deleted: HashSet<&str> = batch.deletes.iter().map(String::as_str).collect();
        state
            .submitted_data
            .retain(|row| !deleted.contains(row.system_id.as_str()));

        for change in &batch.updates {
            if let Some(row) = state
                .submitted_data
                .iter_mut()
                .find(|row| row.system_id == change.system_id)
            {
                row.data = change.data.clone();
                row.is_valid = true;
                row.last_valid_schema_id = Some(batch.dictionary_id);
                row.updated_by = Some(batch.committed_by.clone());
            }
        }

        for change in &batch.validity {
            if let Some(row) = state
                .submitted_data
                .iter_mut()
                .find(|row| row.system_id == change.system_id)
            {
                row.is_valid = change.is_valid;
                if let Some(dictionary_id) = change.last_valid_schema_id {
                    row.last_valid_schema_id = Some(dictionary_id);
                }
            }
        }

        for insert in batch.inserts {
            let id = state.next_id();
            state.submitted_data.push(SubmittedData {
                id,
                system_id: insert.system_id,
                category_id: batch.category_id,
                entity_name: insert.entity_name,
                organization: insert.organization,
                data: insert.data,
                is_valid: true,
                original_schema_id: batch.dictionary_id,
                last_valid_schema_id: Some(batch.dictionary_id),
                created_by: batch.committed_by.clone(),
                updated_by: None,
            });
        }

        if let Some(submission) = state.submissions.get_mut(&batch.submission_id) {
            submission.status = SubmissionStatus::Committed;
            submission.updated_by = Some(batch.committed_by);
            submission.version += 1;
        }

        Ok(())
    }
}

#[async_trait]
impl SubmittedDataRepository for FakeStore {
    async fn list_submitted_data(&self, query: SubmittedDataQuery) -> AppResult<SubmittedDataPage> {
        let state = self.state.lock().await;
        let matching: Vec<&SubmittedData> = state
            .submitted_data
            .iter()
            .filter(|row| row.category_id == query.category_id)
            .filter(|row| {
                query
                    .organization
                    .as_deref()
                    .is_none_or(|organization| row.organization == organization)
            })
            .filter(|row| {
                query.entity_names.is_empty() || query.entity_names.contains(&row.entity_name)
            })
            .collect();

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let page_size = usize::try_from(query.page_size).unwrap_or(usize::MAX);
        Ok(SubmittedDataPage {
            total_records: matching.len() as u64,
            records: matching
                .into_iter()
                .skip(offset)
                .take(page_size)
                .cloned()
                .collect(),
        })
    }

    async fn find_by_system_id(&self, system_id: &str) -> AppResult<Option<SubmittedData>> {
        let state = self.state.lock().await;
        Ok(state
            .submitted_data
            .iter()
            .find(|row| row.system_id == system_id)
            .cloned())
    }

    async fn find_by_entities(
        &self,
        category_id: CategoryId,
        organization: Option<&str>,
        entity_names: &[String],
    ) -> AppResult<Vec<SubmittedData>> {
        let state = self.state.lock().await;
        Ok(state
            .submitted_data
            .iter()
            .filter(|row| row.category_id == category_id)
            .filter(|row| organization.is_none_or(|organization| row.organization == organization))
            .filter(|row| entity_names.contains(&row.entity_name))
            .cloned()
            .collect())
    }

    async fn find_by_category(&self, category_id: CategoryId) -> AppResult<Vec<SubmittedData>> {
        let state = self.state.lock().await;
        Ok(state
            .submitted_data
            .iter()
            .filter(|row| row.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn update_validity(&self, changes: Vec<ValidityChange>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        for change in changes {
            if let Some(row) = state
                .submitted_data
                .iter_mut()
                .find(|row| row.system_id == change.system_id)
            {
                row.is_valid = change.is_valid;
                if let Some(dictionary_id) = change.last_valid_schema_id {
                    row.last_valid_schema_id = Some(dictionary_id);
                }
            }
        }

        Ok(())
    }
}

/// Schema service fake counting fetches.
#[derive(Default)]
pub(crate) struct FakeSchemaProvider {
    dictionaries: Mutex<HashMap<(String, String), DictionaryDefinition>>,
    fetches: AtomicUsize,
}

impl FakeSchemaProvider {
    pub(crate) async fn publish(&self, definition: DictionaryDefinition) {
        self.dictionaries.lock().await.insert(
            (
                definition.name().as_str().to_owned(),
                definition.version().as_str().to_owned(),
            ),
            definition,
        );
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaProvider for FakeSchemaProvider {
    async fn fetch_dictionary(&self, name: &str, version: &str) -> AppResult<DictionaryDefinition> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.dictionaries
            .lock()
            .await
            .get(&(name.to_owned(), version.to_owned()))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("dictionary '{name}' version '{version}'")))
    }
}

/// Validator checking required fields and unique keys.
pub(crate) struct FakeValidator;

#[async_trait]
impl SchemaValidator for FakeValidator {
    async fn validate(
        &self,
        entity_name: &str,
        records: &[DataRecord],
        schema: &SchemaDefinition,
    ) -> AppResult<ValidationResult> {
        let mut invalid_records = Vec::new();
        let mut seen_keys = HashSet::new();

        for (index, record) in records.iter().enumerate() {
            let mut record_errors: Vec<RecordValidationError> = schema
                .fields
                .iter()
                .filter(|field| field.restrictions.required && !record.contains_key(&field.name))
                .map(|field| RecordValidationError {
                    reason: ValidationErrorReason::MissingRequiredField,
                    field_name: field.name.clone(),
                    field_value: Value::Null,
                    index,
                    message: "required".to_owned(),
                })
                .collect();

            if !schema.restrictions.unique_key.is_empty() {
                let key: Vec<String> = schema
                    .restrictions
                    .unique_key
                    .iter()
                    .map(|name| canonical_value_key(record.get(name).unwrap_or(&Value::Null)))
                    .collect();
                if !seen_keys.insert(key) {
                    record_errors.push(RecordValidationError {
                        reason: ValidationErrorReason::InvalidByUnique,
                        field_name: schema.restrictions.unique_key.join(","),
                        field_value: Value::Null,
                        index,
                        message: "duplicate".to_owned(),
                    });
                }
            }

            if !record_errors.is_empty() {
                invalid_records.push(InvalidRecord {
                    record_index: index,
                    record_errors,
                });
            }
        }

        Ok(ValidationResult::failed(vec![EntityValidationDetail {
            schema_name: entity_name.to_owned(),
            invalid_records,
        }]))
    }
}

/// Sequential system id generator.
#[derive(Default)]
pub(crate) struct FakeIdGenerator {
    counter: AtomicUsize,
}

impl SystemIdGenerator for FakeIdGenerator {
    fn generate(&self, _entity_name: &str, _record: &DataRecord) -> AppResult<String> {
        let next = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("NEW{next:04}"))
    }
}

/// Audit sink recording events, optionally failing every append.
#[derive(Default)]
pub(crate) struct FakeAudit {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
    pub(crate) fail: bool,
}

#[async_trait]
impl AuditRepository for FakeAudit {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Internal("audit sink offline".to_owned()));
        }

        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Registers the hr dictionary on a fresh category.
pub(crate) async fn seeded_category(store: &Arc<FakeStore>) -> (CategoryId, DictionaryId) {
    let dictionary = store
        .save_dictionary(hr_dictionary("1.0"))
        .await
        .unwrap_or_else(|_| unreachable!());
    let category = store
        .create_category(NewCategory {
            name: "hr".to_owned(),
            active_dictionary_id: dictionary.id(),
            default_centric_entity: Some("person".to_owned()),
        })
        .await
        .unwrap_or_else(|_| unreachable!());

    (category.id(), dictionary.id())
}
