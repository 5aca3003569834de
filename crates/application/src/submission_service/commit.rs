use super::*;

/// Audit payload captured before the commit is written.
struct PendingAudit {
    entity_name: String,
    action: AuditAction,
    old_data: DataRecord,
    new_data: Option<DataRecord>,
    system_id: String,
}

impl SubmissionService {
    /// Applies a `VALID` submission to submitted data.
    ///
    /// Dependent updates are re-derived from the staged edits and staged data is
    /// revalidated against the active dictionary first; when it no longer
    /// passes, the submission is stored `INVALID` and the commit fails with
    /// `Conflict`. The batch is applied only if the stored submission is still
    /// at the version read here. Audit failures are logged and never fail the
    /// commit.
    pub async fn commit_submission(
        &self,
        actor: &str,
        category_id: CategoryId,
        submission_id: SubmissionId,
    ) -> AppResult<CommitSubmissionResult> {
        let mut submission = self.get_submission(category_id, submission_id).await?;
        if !submission.status.can_commit() {
            return Err(AppError::Conflict(format!(
                "submission '{}' is '{}' and cannot be committed",
                submission.id,
                submission.status.as_str()
            )));
        }
        if submission.data.is_empty() {
            return Err(AppError::Validation(format!(
                "submission '{}' has nothing staged",
                submission.id
            )));
        }

        let (category, dictionary) = self
            .category_service
            .get_category_with_dictionary(category_id)
            .await?;
        let organization = submission.organization.clone();
        let relations = SchemaRelationIndex::from_schemas(dictionary.definition().schemas());

        submission.data.updates = self
            .resolve_update_cascade(
                category.id(),
                organization.as_str(),
                &relations,
                &submission.data.updates,
            )
            .await?;
        let staged_deletes: Vec<SubmittedData> =
            submission.data.deletes.values().flatten().cloned().collect();
        let cascaded_deletes = self
            .resolve_delete_cascade(
                category.id(),
                organization.as_str(),
                &relations,
                staged_deletes,
            )
            .await?;
        submission.data.deletes = merge_delete_batches(&submission.data.deletes, &cascaded_deletes);
        submission.dictionary_id = dictionary.id();

        let ValidationPass {
            classification,
            persisted,
        } = self.validate_staged(&submission, &dictionary).await?;

        if classification.submission_errors.has_errors() {
            submission.errors = classification.submission_errors;
            submission.status = submission
                .status
                .transition(SubmissionEvent::Validated { has_errors: true })?;
            submission.updated_by = Some(actor.to_owned());
            submission.updated_at = Some(Utc::now());
            self.submission_repository
                .save_submission(&submission)
                .await?;
            warn!(
                submission_id = %submission.id,
                "commit rejected, staged data no longer valid"
            );

            return Err(AppError::Conflict(format!(
                "submission '{}' no longer passes validation",
                submission.id
            )));
        }

        let persisted_by_system_id: HashMap<&str, &SubmittedData> = persisted
            .iter()
            .map(|row| (row.system_id.as_str(), row))
            .collect();
        let deleted: HashSet<&str> = submission
            .data
            .deletes
            .values()
            .flatten()
            .map(|row| row.system_id.as_str())
            .collect();

        let mut inserts = Vec::new();
        for (entity_name, insert) in &submission.data.inserts {
            for record in &insert.records {
                inserts.push(NewSubmittedData {
                    system_id: self.system_id_generator.generate(entity_name, record)?,
                    entity_name: entity_name.clone(),
                    organization: organization.clone(),
                    data: record.clone(),
                });
            }
        }

        let mut audits = Vec::new();
        let mut updates = Vec::new();
        for (entity_name, entity_updates) in &submission.data.updates {
            for update in entity_updates {
                if deleted.contains(update.system_id.as_str()) {
                    continue;
                }

                let row = persisted_by_system_id
                    .get(update.system_id.as_str())
                    .ok_or_else(|| {
                        AppError::Conflict(format!(
                            "edited record '{}' no longer exists",
                            update.system_id
                        ))
                    })?;
                let data = apply_update(&row.data, update);
                audits.push(PendingAudit {
                    entity_name: entity_name.clone(),
                    action: AuditAction::SubmittedDataUpdated,
                    old_data: row.data.clone(),
                    new_data: Some(data.clone()),
                    system_id: update.system_id.clone(),
                });
                updates.push(SubmittedDataChange {
                    system_id: update.system_id.clone(),
                    data,
                });
            }
        }

        let mut deletes = Vec::new();
        for (entity_name, rows) in &submission.data.deletes {
            for row in rows {
                audits.push(PendingAudit {
                    entity_name: entity_name.clone(),
                    action: AuditAction::SubmittedDataDeleted,
                    old_data: row.data.clone(),
                    new_data: None,
                    system_id: row.system_id.clone(),
                });
                deletes.push(row.system_id.clone());
            }
        }

        let validity = validity_changes(&classification, &persisted_by_system_id, &dictionary);
        let inserted_system_ids: Vec<String> =
            inserts.iter().map(|insert| insert.system_id.clone()).collect();
        let result = CommitSubmissionResult {
            submission_id: submission.id,
            inserted_system_ids,
            updated: updates.len(),
            deleted: deletes.len(),
        };

        self.submission_repository
            .commit_submission(CommitBatch {
                submission_id: submission.id,
                expected_version: submission.version,
                category_id: category.id(),
                dictionary_id: dictionary.id(),
                committed_by: actor.to_owned(),
                inserts,
                updates,
                deletes,
                validity,
            })
            .await?;

        info!(
            submission_id = %submission.id,
            category_id = %category.id(),
            inserted = result.inserted_system_ids.len(),
            updated = result.updated,
            deleted = result.deleted,
            "committed submission"
        );

        for audit in audits {
            let system_id = audit.system_id.clone();
            let appended = self
                .audit_repository
                .append_event(AuditEvent {
                    category_id: category.id(),
                    entity_name: audit.entity_name,
                    action: audit.action,
                    old_data: Some(audit.old_data),
                    new_data: audit.new_data,
                    organization: organization.clone(),
                    system_id: audit.system_id,
                    subject: actor.to_owned(),
                })
                .await;
            if let Err(error) = appended {
                warn!(
                    submission_id = %submission.id,
                    system_id = %system_id,
                    error = %error,
                    "failed to append audit event"
                );
            }
        }

        Ok(result)
    }
}

/// Validity updates for committed records validated alongside the batch.
fn validity_changes(
    classification: &ValidationClassification,
    persisted: &HashMap<&str, &SubmittedData>,
    dictionary: &Dictionary,
) -> Vec<ValidityChange> {
    let invalid = classification
        .invalid_system_ids
        .iter()
        .filter(|system_id| {
            persisted
                .get(system_id.as_str())
                .is_some_and(|row| row.is_valid)
        })
        .map(|system_id| ValidityChange {
            system_id: system_id.clone(),
            is_valid: false,
            last_valid_schema_id: None,
        });
    let valid = classification
        .valid_system_ids
        .iter()
        .filter(|system_id| {
            persisted.get(system_id.as_str()).is_some_and(|row| {
                !row.is_valid || row.last_valid_schema_id != Some(dictionary.id())
            })
        })
        .map(|system_id| ValidityChange {
            system_id: system_id.clone(),
            is_valid: true,
            last_valid_schema_id: Some(dictionary.id()),
        });

    invalid.chain(valid).collect()
}
