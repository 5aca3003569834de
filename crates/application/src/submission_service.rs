use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use dictum_core::{AppError, AppResult, CategoryId, SubmissionId};
use dictum_domain::{
    AuditAction, Category, DataRecord, DependentUpdateInput, Dictionary, EntityDataSources,
    SchemaRelationIndex, Submission, SubmissionData, SubmissionErrors, SubmissionEvent,
    SubmissionInsert, SubmissionUpdate, SubmittedData, ValidationClassification,
    ValidationResult, apply_update, build_dependent_update_instructions,
    classify_validation_result, compute_data_diff, dependent_new_values, explicit_updates,
    find_affected_relations, find_dependent_delete_filters, find_unrecognized_fields,
    group_by_entity_with_full_context, merge_delete_batches, merge_insert_batches,
    merge_update_batches,
};
use tracing::{info, warn};

use crate::CategoryService;
use crate::submission_ports::{
    AuditEvent, AuditRepository, CommitBatch, CommitSubmissionResult, DeleteSubmittedDataInput,
    EditSubmittedDataInput, NewSubmission, NewSubmittedData, RemoveStagedRecordsInput,
    SchemaValidator, StagedAction, SubmissionRepository, SubmittedDataChange,
    SubmittedDataRepository, SystemIdGenerator, UploadSubmissionInput, ValidityChange,
};

mod cascade;
mod commit;
mod edit;
mod lifecycle;
mod upload;
mod validate;

use validate::ValidationPass;

/// Application service staging, validating and committing submissions.
#[derive(Clone)]
pub struct SubmissionService {
    category_service: CategoryService,
    submission_repository: Arc<dyn SubmissionRepository>,
    submitted_data_repository: Arc<dyn SubmittedDataRepository>,
    schema_validator: Arc<dyn SchemaValidator>,
    system_id_generator: Arc<dyn SystemIdGenerator>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl SubmissionService {
    /// Creates a submission service from its collaborators.
    #[must_use]
    pub fn new(
        category_service: CategoryService,
        submission_repository: Arc<dyn SubmissionRepository>,
        submitted_data_repository: Arc<dyn SubmittedDataRepository>,
        schema_validator: Arc<dyn SchemaValidator>,
        system_id_generator: Arc<dyn SystemIdGenerator>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            category_service,
            submission_repository,
            submitted_data_repository,
            schema_validator,
            system_id_generator,
            audit_repository,
        }
    }

    async fn open_or_create_submission(
        &self,
        actor: &str,
        category: &Category,
        dictionary: &Dictionary,
        organization: &str,
    ) -> AppResult<Submission> {
        if let Some(submission) = self
            .submission_repository
            .find_active_submission(category.id(), organization)
            .await?
        {
            return Ok(submission);
        }

        let submission = self
            .submission_repository
            .create_submission(NewSubmission {
                category_id: category.id(),
                dictionary_id: dictionary.id(),
                organization: organization.to_owned(),
                created_by: actor.to_owned(),
            })
            .await?;
        info!(
            submission_id = %submission.id,
            category_id = %category.id(),
            organization,
            "opened submission"
        );

        Ok(submission)
    }

    /// Merges incoming changes into the staged data, then validates and stores it.
    async fn stage_and_validate(
        &self,
        actor: &str,
        mut submission: Submission,
        dictionary: &Dictionary,
        incoming: &SubmissionData,
    ) -> AppResult<Submission> {
        submission.ensure_active()?;
        submission.data = submission.data.merge(incoming);
        self.revalidate_and_save(actor, submission, dictionary)
            .await
    }

    /// Validates the staged data as it stands and stores the outcome.
    async fn revalidate_and_save(
        &self,
        actor: &str,
        mut submission: Submission,
        dictionary: &Dictionary,
    ) -> AppResult<Submission> {
        submission.data.prune_empty();
        submission.status = submission.status.transition(SubmissionEvent::Staged)?;
        submission.dictionary_id = dictionary.id();

        let pass = self.validate_staged(&submission, dictionary).await?;
        let has_errors = pass.classification.submission_errors.has_errors();
        submission.errors = pass.classification.submission_errors;
        submission.status = submission
            .status
            .transition(SubmissionEvent::Validated { has_errors })?;
        submission.updated_by = Some(actor.to_owned());
        submission.updated_at = Some(Utc::now());

        self.submission_repository
            .save_submission(&submission)
            .await
    }
}

fn require_organization(organization: &str) -> AppResult<&str> {
    let organization = organization.trim();
    if organization.is_empty() {
        return Err(AppError::Validation(
            "organization must not be empty".to_owned(),
        ));
    }

    Ok(organization)
}

#[cfg(test)]
mod tests;
