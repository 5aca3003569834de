use std::sync::Arc;

use dictum_core::{AppError, AppResult, CategoryId, DictionaryId};
use dictum_domain::{
    AuditAction, DataRecord, Submission, SubmissionStatus, ValidationErrorReason,
};
use serde_json::{Value, json};

use crate::test_support::{
    FakeAudit, FakeIdGenerator, FakeSchemaProvider, FakeStore, FakeValidator, record,
    seeded_category,
};
use crate::{
    CategoryService, DeleteSubmittedDataInput, EditSubmittedDataInput, RemoveStagedRecordsInput,
    StagedAction, SubmittedDataEdit, SystemIdGenerator, UploadBatch, UploadSubmissionInput,
};

use super::SubmissionService;

struct Harness {
    service: SubmissionService,
    store: Arc<FakeStore>,
    audit: Arc<FakeAudit>,
    category_id: CategoryId,
    dictionary_id: DictionaryId,
}

struct UnconfiguredIdGenerator;

impl SystemIdGenerator for UnconfiguredIdGenerator {
    fn generate(&self, _entity_name: &str, _record: &DataRecord) -> AppResult<String> {
        Err(AppError::NotImplemented("system id generation".to_owned()))
    }
}

async fn harness_with(audit: FakeAudit, generator: Arc<dyn SystemIdGenerator>) -> Harness {
    let store = Arc::new(FakeStore::default());
    let audit = Arc::new(audit);
    let (category_id, dictionary_id) = seeded_category(&store).await;
    let category_service =
        CategoryService::new(store.clone(), Arc::new(FakeSchemaProvider::default()));
    let service = SubmissionService::new(
        category_service,
        store.clone(),
        store.clone(),
        Arc::new(FakeValidator),
        generator,
        audit.clone(),
    );

    Harness {
        service,
        store,
        audit,
        category_id,
        dictionary_id,
    }
}

async fn harness() -> Harness {
    harness_with(FakeAudit::default(), Arc::new(FakeIdGenerator::default())).await
}

impl Harness {
    async fn upload(&self, entity_name: &str, records: Vec<Value>) -> AppResult<Submission> {
        self.service
            .upload_submission(
                "alice",
                UploadSubmissionInput {
                    category_id: self.category_id,
                    organization: "org".to_owned(),
                    batches: vec![UploadBatch {
                        entity_name: entity_name.to_owned(),
                        batch_name: format!("{entity_name}.tsv"),
                        records: records.into_iter().map(record).collect(),
                    }],
                },
            )
            .await
    }

    async fn seed(&self, system_id: &str, entity_name: &str, data: Value) {
        self.store
            .seed_row(self.category_id, self.dictionary_id, system_id, entity_name, data)
            .await;
    }

    async fn seed_hr_chain(&self) {
        self.seed("SYS-P", "person", json!({"personId": "RRRRR001", "name": "Ann"}))
            .await;
        self.seed(
            "SYS-E",
            "employee",
            json!({"employeeId": "E1", "personId": "RRRRR001"}),
        )
        .await;
        self.seed(
            "SYS-S",
            "payslip",
            json!({"payslipId": "S1", "employeeId": "E1"}),
        )
        .await;
    }

    async fn edit_person(&self, system_id: &str, data: Value) -> AppResult<Submission> {
        self.service
            .edit_submitted_data(
                "alice",
                EditSubmittedDataInput {
                    category_id: self.category_id,
                    organization: "org".to_owned(),
                    entity_name: "person".to_owned(),
                    edits: vec![SubmittedDataEdit {
                        system_id: system_id.to_owned(),
                        data: record(data),
                    }],
                },
            )
            .await
    }

    async fn stored_field(&self, system_id: &str, field_name: &str) -> Option<Value> {
        self.store
            .rows()
            .await
            .into_iter()
            .find(|row| row.system_id == system_id)
            .and_then(|row| row.data.get(field_name).cloned())
    }
}

fn succeeded(result: AppResult<Submission>) -> Submission {
    match result {
        Ok(submission) => submission,
        Err(error) => panic!("operation should succeed: {error}"),
    }
}

#[tokio::test]
async fn upload_opens_valid_submission_and_deduplicates() {
    let harness = harness().await;

    let first = succeeded(
        harness
            .upload("person", vec![json!({"personId": "P1"}), json!({"personId": "P2"})])
            .await,
    );
    assert_eq!(first.status, SubmissionStatus::Valid);

    let second = succeeded(
        harness
            .upload("person", vec![json!({"personId": "P2"}), json!({"personId": "P3"})])
            .await,
    );

    assert_eq!(second.id, first.id);
    let staged = &second.data.inserts["person"];
    assert_eq!(staged.records.len(), 3);
    assert_eq!(staged.batch_name, "person.tsv");
}

#[tokio::test]
async fn missing_required_field_marks_submission_invalid() {
    let harness = harness().await;

    let submission = succeeded(
        harness
            .upload("person", vec![json!({"personId": "P1"}), json!({"name": "Nobody"})])
            .await,
    );

    assert_eq!(submission.status, SubmissionStatus::Invalid);
    let errors = &submission.errors.inserts["person"];
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].index, 1);
    assert_eq!(errors[0].reason, ValidationErrorReason::MissingRequiredField);
}

#[tokio::test]
async fn unknown_field_is_reported_as_record_error() {
    let harness = harness().await;

    let submission = succeeded(
        harness
            .upload("person", vec![json!({"personId": "P1", "shoeSize": 44})])
            .await,
    );

    assert_eq!(submission.status, SubmissionStatus::Invalid);
    assert_eq!(
        submission.errors.inserts["person"][0].reason,
        ValidationErrorReason::UnrecognizedField
    );
}

#[tokio::test]
async fn unknown_entity_is_rejected() {
    let harness = harness().await;

    let result = harness.upload("spaceship", vec![json!({"id": 1})]).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn duplicate_against_committed_data_is_invalid() {
    let harness = harness().await;
    harness.seed("SYS-P", "person", json!({"personId": "P1"})).await;

    let submission = succeeded(harness.upload("person", vec![json!({"personId": "P1"})]).await);

    assert_eq!(submission.status, SubmissionStatus::Invalid);
    assert_eq!(
        submission.errors.inserts["person"][0].reason,
        ValidationErrorReason::InvalidByUnique
    );
}

#[tokio::test]
async fn commit_mints_system_ids_and_finalizes_submission() {
    let harness = harness().await;
    let submission = succeeded(
        harness
            .upload("person", vec![json!({"personId": "P1"}), json!({"personId": "P2"})])
            .await,
    );

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, submission.id)
        .await;
    let Ok(result) = result else {
        panic!("commit should succeed");
    };

    assert_eq!(result.inserted_system_ids, vec!["NEW0001", "NEW0002"]);
    let rows = harness.store.rows().await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.last_valid_schema_id == Some(harness.dictionary_id)));

    let stored = harness
        .service
        .get_submission(harness.category_id, submission.id)
        .await;
    assert_eq!(
        stored.map(|submission| submission.status).ok(),
        Some(SubmissionStatus::Committed)
    );
    let active = harness
        .service
        .get_active_submission(harness.category_id, "org")
        .await;
    assert!(matches!(active, Ok(None)));
}

#[tokio::test]
async fn commit_requires_valid_status() {
    let harness = harness().await;
    let submission = succeeded(harness.upload("person", vec![json!({"name": "NoId"})]).await);

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, submission.id)
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(harness.store.rows().await.is_empty());
}

#[tokio::test]
async fn commit_after_close_is_conflict() {
    let harness = harness().await;
    let submission = succeeded(harness.upload("person", vec![json!({"personId": "P1"})]).await);

    let closed = harness
        .service
        .close_submission("bob", harness.category_id, submission.id)
        .await;
    assert_eq!(
        closed.map(|submission| submission.status).ok(),
        Some(SubmissionStatus::Closed)
    );

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, submission.id)
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let reclose = harness
        .service
        .close_submission("bob", harness.category_id, submission.id)
        .await;
    assert!(matches!(reclose, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn commit_revalidates_against_current_data() {
    let harness = harness().await;
    let submission = succeeded(harness.upload("person", vec![json!({"personId": "P1"})]).await);
    assert_eq!(submission.status, SubmissionStatus::Valid);

    harness.seed("SYS-LATE", "person", json!({"personId": "P1"})).await;

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, submission.id)
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    let stored = harness
        .service
        .get_submission(harness.category_id, submission.id)
        .await;
    assert_eq!(
        stored.map(|submission| submission.status).ok(),
        Some(SubmissionStatus::Invalid)
    );
}

#[tokio::test]
async fn unconfigured_id_generation_fails_commit() {
    let harness = harness_with(FakeAudit::default(), Arc::new(UnconfiguredIdGenerator)).await;
    let submission = succeeded(harness.upload("person", vec![json!({"personId": "P1"})]).await);

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, submission.id)
        .await;

    assert!(matches!(result, Err(AppError::NotImplemented(_))));
    let stored = harness
        .service
        .get_submission(harness.category_id, submission.id)
        .await;
    assert_eq!(
        stored.map(|submission| submission.status).ok(),
        Some(SubmissionStatus::Valid)
    );
}

#[tokio::test]
async fn identifier_edit_cascades_to_dependents() {
    let harness = harness().await;
    harness.seed_hr_chain().await;

    let submission = succeeded(
        harness
            .service
            .edit_submitted_data(
                "alice",
                EditSubmittedDataInput {
                    category_id: harness.category_id,
                    organization: "org".to_owned(),
                    entity_name: "person".to_owned(),
                    edits: vec![SubmittedDataEdit {
                        system_id: "SYS-P".to_owned(),
                        data: record(json!({"personId": "PPPPP001", "name": "Ann"})),
                    }],
                },
            )
            .await,
    );

    assert_eq!(submission.status, SubmissionStatus::Valid);
    let employee_updates = &submission.data.updates["employee"];
    assert_eq!(employee_updates.len(), 1);
    assert_eq!(employee_updates[0].system_id, "SYS-E");
    assert_eq!(
        employee_updates[0].old.get("personId"),
        Some(&json!("RRRRR001"))
    );
    assert_eq!(
        employee_updates[0].new.get("personId"),
        Some(&json!("PPPPP001"))
    );
    assert!(!submission.data.updates.contains_key("payslip"));

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, submission.id)
        .await;
    assert_eq!(result.map(|result| result.updated).ok(), Some(2));

    let rows = harness.store.rows().await;
    let employee = rows.iter().find(|row| row.system_id == "SYS-E");
    assert_eq!(
        employee.and_then(|row| row.data.get("personId")),
        Some(&json!("PPPPP001"))
    );

    let events = harness.audit.events.lock().await;
    assert_eq!(events.len(), 2);
    assert!(
        events
            .iter()
            .all(|event| event.action == AuditAction::SubmittedDataUpdated)
    );
}

#[tokio::test]
async fn edit_of_unknown_system_id_is_rejected() {
    let harness = harness().await;

    let result = harness
        .service
        .edit_submitted_data(
            "alice",
            EditSubmittedDataInput {
                category_id: harness.category_id,
                organization: "org".to_owned(),
                entity_name: "person".to_owned(),
                edits: vec![SubmittedDataEdit {
                    system_id: "SYS-GHOST".to_owned(),
                    data: record(json!({"personId": "P1"})),
                }],
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn delete_cascades_to_every_dependent() {
    let harness = harness().await;
    harness.seed_hr_chain().await;
    harness.seed("SYS-Q", "person", json!({"personId": "OTHER"})).await;

    let submission = succeeded(
        harness
            .service
            .delete_submitted_data(
                "alice",
                DeleteSubmittedDataInput {
                    category_id: harness.category_id,
                    organization: "org".to_owned(),
                    system_id: "SYS-P".to_owned(),
                },
            )
            .await,
    );

    let staged: Vec<&str> = submission
        .data
        .deletes
        .values()
        .flatten()
        .map(|row| row.system_id.as_str())
        .collect();
    assert_eq!(staged.len(), 3);
    assert!(!staged.contains(&"SYS-Q"));

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, submission.id)
        .await;
    assert_eq!(result.map(|result| result.deleted).ok(), Some(3));

    let remaining: Vec<String> = harness
        .store
        .rows()
        .await
        .into_iter()
        .map(|row| row.system_id)
        .collect();
    assert_eq!(remaining, vec!["SYS-Q".to_owned()]);
    assert_eq!(harness.audit.events.lock().await.len(), 3);
}

#[tokio::test]
async fn delete_of_missing_record_is_not_found() {
    let harness = harness().await;

    let result = harness
        .service
        .delete_submitted_data(
            "alice",
            DeleteSubmittedDataInput {
                category_id: harness.category_id,
                organization: "org".to_owned(),
                system_id: "SYS-GHOST".to_owned(),
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn audit_failures_do_not_fail_commit() {
    let harness = harness_with(
        FakeAudit {
            fail: true,
            ..FakeAudit::default()
        },
        Arc::new(FakeIdGenerator::default()),
    )
    .await;
    harness.seed("SYS-P", "person", json!({"personId": "P1"})).await;

    let submission = succeeded(
        harness
            .service
            .delete_submitted_data(
                "alice",
                DeleteSubmittedDataInput {
                    category_id: harness.category_id,
                    organization: "org".to_owned(),
                    system_id: "SYS-P".to_owned(),
                },
            )
            .await,
    );

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, submission.id)
        .await;

    assert!(result.is_ok());
    assert!(harness.store.rows().await.is_empty());
}

#[tokio::test]
async fn removing_staged_records_revalidates() {
    let harness = harness().await;
    let submission = succeeded(
        harness
            .upload("person", vec![json!({"name": "NoId"}), json!({"personId": "P1"})])
            .await,
    );
    assert_eq!(submission.status, SubmissionStatus::Invalid);

    let removed = succeeded(
        harness
            .service
            .remove_staged_records(
                "alice",
                RemoveStagedRecordsInput {
                    submission_id: submission.id,
                    category_id: harness.category_id,
                    entity_name: "person".to_owned(),
                    action: StagedAction::Inserts,
                    index: Some(0),
                },
            )
            .await,
    );

    assert_eq!(removed.status, SubmissionStatus::Valid);
    assert_eq!(removed.data.inserts["person"].records.len(), 1);
    assert!(!removed.errors.has_errors());

    let out_of_range = harness
        .service
        .remove_staged_records(
            "alice",
            RemoveStagedRecordsInput {
                submission_id: submission.id,
                category_id: harness.category_id,
                entity_name: "person".to_owned(),
                action: StagedAction::Inserts,
                index: Some(5),
            },
        )
        .await;
    assert!(matches!(out_of_range, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn submission_of_other_category_is_not_found() {
    let harness = harness().await;
    let submission = succeeded(harness.upload("person", vec![json!({"personId": "P1"})]).await);

    let result = harness
        .service
        .get_submission(CategoryId::new(999), submission.id)
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn re_edit_drops_cascades_of_replaced_edit() {
    let harness = harness().await;
    harness.seed_hr_chain().await;

    let first = succeeded(
        harness
            .edit_person("SYS-P", json!({"personId": "PPPPP001", "name": "Ann"}))
            .await,
    );
    assert!(first.data.updates.contains_key("employee"));

    let second = succeeded(
        harness
            .edit_person("SYS-P", json!({"personId": "RRRRR001", "name": "Bob"}))
            .await,
    );
    assert_eq!(second.id, first.id);
    assert!(!second.data.updates.contains_key("employee"));
    let person_updates = &second.data.updates["person"];
    assert_eq!(person_updates.len(), 1);
    assert_eq!(person_updates[0].new, record(json!({"name": "Bob"})));

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, second.id)
        .await;
    assert_eq!(result.map(|result| result.updated).ok(), Some(1));

    assert_eq!(harness.stored_field("SYS-P", "personId").await, Some(json!("RRRRR001")));
    assert_eq!(harness.stored_field("SYS-P", "name").await, Some(json!("Bob")));
    assert_eq!(harness.stored_field("SYS-E", "personId").await, Some(json!("RRRRR001")));
}

#[tokio::test]
async fn re_edit_to_another_identifier_retargets_cascade() {
    let harness = harness().await;
    harness.seed_hr_chain().await;

    succeeded(
        harness
            .edit_person("SYS-P", json!({"personId": "PPPPP001", "name": "Ann"}))
            .await,
    );
    let second = succeeded(
        harness
            .edit_person("SYS-P", json!({"personId": "QQQQQ001", "name": "Ann"}))
            .await,
    );

    let employee_updates = &second.data.updates["employee"];
    assert_eq!(employee_updates.len(), 1);
    assert_eq!(employee_updates[0].new.get("personId"), Some(&json!("QQQQQ001")));

    let result = harness
        .service
        .commit_submission("alice", harness.category_id, second.id)
        .await;
    assert!(result.is_ok());
    assert_eq!(harness.stored_field("SYS-P", "personId").await, Some(json!("QQQQQ001")));
    assert_eq!(harness.stored_field("SYS-E", "personId").await, Some(json!("QQQQQ001")));
}

#[tokio::test]
async fn reverting_edit_unstages_it_with_its_cascades() {
    let harness = harness().await;
    harness.seed_hr_chain().await;

    succeeded(
        harness
            .edit_person("SYS-P", json!({"personId": "PPPPP001", "name": "Ann"}))
            .await,
    );
    let reverted = succeeded(
        harness
            .edit_person("SYS-P", json!({"personId": "RRRRR001", "name": "Ann"}))
            .await,
    );

    assert!(reverted.data.updates.is_empty());
    assert_eq!(reverted.status, SubmissionStatus::Valid);

    let commit = harness
        .service
        .commit_submission("alice", harness.category_id, reverted.id)
        .await;
    assert!(matches!(commit, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn unchanged_edit_without_staged_edit_is_rejected() {
    let harness = harness().await;
    harness.seed_hr_chain().await;

    let result = harness
        .edit_person("SYS-P", json!({"personId": "RRRRR001", "name": "Ann"}))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn removing_staged_edit_removes_its_cascades() {
    let harness = harness().await;
    harness.seed_hr_chain().await;
    let submission = succeeded(
        harness
            .edit_person("SYS-P", json!({"personId": "PPPPP001", "name": "Ann"}))
            .await,
    );
    assert!(submission.data.updates.contains_key("employee"));

    let removed = succeeded(
        harness
            .service
            .remove_staged_records(
                "alice",
                RemoveStagedRecordsInput {
                    submission_id: submission.id,
                    category_id: harness.category_id,
                    entity_name: "person".to_owned(),
                    action: StagedAction::Updates,
                    index: None,
                },
            )
            .await,
    );

    assert!(removed.data.updates.is_empty());
}

#[tokio::test]
async fn commit_fails_when_edited_record_vanished() {
    let harness = harness().await;
    harness.seed_hr_chain().await;
    let submission = succeeded(
        harness
            .edit_person("SYS-P", json!({"personId": "RRRRR001", "name": "Bob"}))
            .await,
    );
    assert_eq!(submission.status, SubmissionStatus::Valid);

    harness.store.remove_row("SYS-P").await;
    let result = harness
        .service
        .commit_submission("alice", harness.category_id, submission.id)
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    let stored = harness
        .service
        .get_submission(harness.category_id, submission.id)
        .await;
    assert_ne!(
        stored.map(|submission| submission.status).ok(),
        Some(SubmissionStatus::Committed)
    );
}

#[tokio::test]
async fn every_stored_change_bumps_submission_version() {
    let harness = harness().await;

    let first = succeeded(harness.upload("person", vec![json!({"personId": "P1"})]).await);
    let second = succeeded(harness.upload("person", vec![json!({"personId": "P2"})]).await);

    assert_eq!(second.id, first.id);
    assert!(second.version > first.version);
    assert_eq!(second.data.inserts["person"].records.len(), 2);
}
