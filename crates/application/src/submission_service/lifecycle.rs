use super::*;

impl SubmissionService {
    /// Returns one submission of a category.
    pub async fn get_submission(
        &self,
        category_id: CategoryId,
        submission_id: SubmissionId,
    ) -> AppResult<Submission> {
        let submission = self
            .submission_repository
            .find_submission(submission_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("submission '{submission_id}' does not exist"))
            })?;
        submission.ensure_category(category_id)?;

        Ok(submission)
    }

    /// Returns the active submission of an organization, if any.
    pub async fn get_active_submission(
        &self,
        category_id: CategoryId,
        organization: &str,
    ) -> AppResult<Option<Submission>> {
        let organization = require_organization(organization)?;
        self.category_service.get_category(category_id).await?;

        self.submission_repository
            .find_active_submission(category_id, organization)
            .await
    }

    /// Abandons a submission.
    pub async fn close_submission(
        &self,
        actor: &str,
        category_id: CategoryId,
        submission_id: SubmissionId,
    ) -> AppResult<Submission> {
        let mut submission = self.get_submission(category_id, submission_id).await?;
        submission.status = submission.status.transition(SubmissionEvent::Closed)?;
        submission.updated_by = Some(actor.to_owned());
        submission.updated_at = Some(Utc::now());

        let submission = self
            .submission_repository
            .save_submission(&submission)
            .await?;
        info!(submission_id = %submission.id, "closed submission");

        Ok(submission)
    }

    /// Unstages changes of one entity and revalidates what remains.
    ///
    /// Dependent updates are re-derived after unstaging updates, so removing
    /// an edit also removes the cascades it caused.
    pub async fn remove_staged_records(
        &self,
        actor: &str,
        input: RemoveStagedRecordsInput,
    ) -> AppResult<Submission> {
        let mut submission = self
            .get_submission(input.category_id, input.submission_id)
            .await?;
        submission.ensure_active()?;
        let (category, dictionary) = self
            .category_service
            .get_category_with_dictionary(input.category_id)
            .await?;

        let entity_name = input.entity_name.as_str();
        let data = &mut submission.data;
        let removed = match input.action {
            StagedAction::Inserts => match data.inserts.get_mut(entity_name) {
                Some(insert) => remove_staged(&mut insert.records, input.index),
                None => None,
            },
            StagedAction::Updates => data
                .updates
                .get_mut(entity_name)
                .and_then(|updates| remove_staged(updates, input.index)),
            StagedAction::Deletes => data
                .deletes
                .get_mut(entity_name)
                .and_then(|deletes| remove_staged(deletes, input.index)),
        };

        let Some(removed) = removed else {
            return Err(AppError::Validation(format!(
                "no staged {:?} at {:?} for entity '{}'",
                input.action, input.index, entity_name
            )));
        };

        if input.action == StagedAction::Updates {
            let relations = SchemaRelationIndex::from_schemas(dictionary.definition().schemas());
            let organization = submission.organization.clone();
            submission.data.updates = self
                .resolve_update_cascade(
                    category.id(),
                    organization.as_str(),
                    &relations,
                    &submission.data.updates,
                )
                .await?;
        }

        let submission = self
            .revalidate_and_save(actor, submission, &dictionary)
            .await?;
        info!(
            submission_id = %submission.id,
            entity = %input.entity_name,
            removed,
            status = submission.status.as_str(),
            "removed staged records"
        );

        Ok(submission)
    }
}

/// Removes one position, or everything when no position is given.
///
/// Returns the number of removed entries, `None` when the position is absent.
fn remove_staged<T>(entries: &mut Vec<T>, index: Option<usize>) -> Option<usize> {
    match index {
        Some(index) if index < entries.len() => {
            entries.remove(index);
            Some(1)
        }
        Some(_) => None,
        None if entries.is_empty() => None,
        None => {
            let removed = entries.len();
            entries.clear();
            Some(removed)
        }
    }
}
