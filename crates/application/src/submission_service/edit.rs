use super::*;

impl SubmissionService {
    /// Stages edits of committed records along with the dependent updates they imply.
    ///
    /// A later edit of a record replaces its earlier staged edit. An edit that
    /// restores the committed values unstages the earlier edit. Dependent
    /// updates are re-derived from the remaining edits either way.
    pub async fn edit_submitted_data(
        &self,
        actor: &str,
        input: EditSubmittedDataInput,
    ) -> AppResult<Submission> {
        let organization = require_organization(input.organization.as_str())?;
        if input.edits.is_empty() {
            return Err(AppError::Validation("edit contains no records".to_owned()));
        }

        let (category, dictionary) = self
            .category_service
            .get_category_with_dictionary(input.category_id)
            .await?;
        dictionary.require_schema(input.entity_name.as_str())?;

        let mut updates = Vec::with_capacity(input.edits.len());
        let mut reverted = HashSet::new();
        for edit in input.edits {
            let row = self
                .submitted_data_repository
                .find_by_system_id(edit.system_id.as_str())
                .await?
                .filter(|row| {
                    row.category_id == category.id()
                        && row.organization == organization
                        && row.entity_name == input.entity_name
                })
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "system id '{}' does not identify a '{}' record of organization '{}'",
                        edit.system_id, input.entity_name, organization
                    ))
                })?;

            let diff = compute_data_diff(&row.data, &edit.data);
            if diff.is_empty() {
                reverted.insert(row.system_id);
                continue;
            }

            updates.push(SubmissionUpdate {
                system_id: row.system_id,
                old: diff.old,
                new: diff.new,
                cascaded_fields: BTreeSet::new(),
            });
        }

        let mut submission = if updates.is_empty() {
            self.submission_repository
                .find_active_submission(category.id(), organization)
                .await?
                .filter(|submission| {
                    explicit_updates(&submission.data.updates)
                        .get(input.entity_name.as_str())
                        .is_some_and(|staged| {
                            staged
                                .iter()
                                .any(|update| reverted.contains(update.system_id.as_str()))
                        })
                })
                .ok_or_else(|| {
                    AppError::Validation("edit does not change any field".to_owned())
                })?
        } else {
            self.open_or_create_submission(actor, &category, &dictionary, organization)
                .await?
        };
        submission.ensure_active()?;

        let mut explicit = explicit_updates(&submission.data.updates);
        if let Some(staged) = explicit.get_mut(input.entity_name.as_str()) {
            staged.retain(|update| !reverted.contains(update.system_id.as_str()));
        }
        let edited = updates.len();
        let incoming = BTreeMap::from([(input.entity_name, updates)]);
        let explicit = merge_update_batches(&explicit, &incoming);

        let relations = SchemaRelationIndex::from_schemas(dictionary.definition().schemas());
        submission.data.updates = self
            .resolve_update_cascade(category.id(), organization, &relations, &explicit)
            .await?;
        info!(
            category_id = %category.id(),
            edited,
            reverted = reverted.len(),
            staged = submission.data.updates.values().map(Vec::len).sum::<usize>(),
            "resolved edit cascade"
        );

        self.revalidate_and_save(actor, submission, &dictionary)
            .await
    }

    /// Stages the removal of a committed record and every record depending on it.
    pub async fn delete_submitted_data(
        &self,
        actor: &str,
        input: DeleteSubmittedDataInput,
    ) -> AppResult<Submission> {
        let organization = require_organization(input.organization.as_str())?;
        let (category, dictionary) = self
            .category_service
            .get_category_with_dictionary(input.category_id)
            .await?;

        let row = self
            .submitted_data_repository
            .find_by_system_id(input.system_id.as_str())
            .await?
            .filter(|row| row.category_id == category.id() && row.organization == organization)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "submitted data '{}' does not exist for organization '{}'",
                    input.system_id, organization
                ))
            })?;

        let relations = SchemaRelationIndex::from_schemas(dictionary.definition().schemas());
        let deletes = self
            .resolve_delete_cascade(category.id(), organization, &relations, vec![row])
            .await?;
        info!(
            category_id = %category.id(),
            system_id = %input.system_id,
            removed = deletes.values().map(Vec::len).sum::<usize>(),
            "resolved delete cascade"
        );

        let submission = self
            .open_or_create_submission(actor, &category, &dictionary, organization)
            .await?;
        self.stage_and_validate(
            actor,
            submission,
            &dictionary,
            &SubmissionData {
                deletes,
                ..SubmissionData::default()
            },
        )
        .await
    }
}
