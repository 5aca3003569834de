use super::*;

impl InMemorySubmissionStore {
    pub(super) async fn create_submission_impl(
        &self,
        submission: NewSubmission,
    ) -> AppResult<Submission> {
        let mut submissions = self.submissions.write().await;
        let active_exists = submissions.values().any(|stored| {
            stored.category_id == submission.category_id
                && stored.organization == submission.organization
                && stored.status.is_active()
        });
        if active_exists {
            return Err(AppError::Conflict(format!(
                "organization '{}' already has an active submission in category '{}'",
                submission.organization, submission.category_id
            )));
        }

        let created = Submission {
            id: SubmissionId::new(self.next_id()),
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
        submissions.insert(created.id, created.clone());
        Ok(created)
    }

    pub(super) async fn find_active_submission_impl(
        &self,
        category_id: CategoryId,
        organization: &str,
    ) -> AppResult<Option<Submission>> {
        Ok(self
            .submissions
            .read()
            .await
            .values()
            .find(|submission| {
                submission.category_id == category_id
                    && submission.organization == organization
                    && submission.status.is_active()
            })
            .cloned())
    }

    pub(super) async fn save_submission_impl(
        &self,
        submission: &Submission,
    ) -> AppResult<Submission> {
        let mut submissions = self.submissions.write().await;
        let Some(stored) = submissions.get_mut(&submission.id) else {
            return Err(AppError::NotFound(format!(
                "submission '{}' does not exist",
                submission.id
            )));
        };
        if !stored.status.is_active() {
            return Err(AppError::Conflict(format!(
                "submission '{}' is '{}' and can no longer change",
                stored.id,
                stored.status.as_str()
            )));
        }

        if stored.version != submission.version {
            return Err(AppError::Conflict(format!(
                "submission '{}' changed since version {}",
                stored.id, submission.version
            )));
        }

        *stored = submission.clone();
        stored.version += 1;
        Ok(stored.clone())
    }

    pub(super) async fn commit_submission_impl(&self, batch: CommitBatch) -> AppResult<()> {
        let mut submissions = self.submissions.write().await;
        let mut rows = self.submitted_data.write().await;

        let Some(submission) = submissions.get_mut(&batch.submission_id) else {
            return Err(AppError::NotFound(format!(
                "submission '{}' does not exist",
                batch.submission_id
            )));
        };
        if submission.status != SubmissionStatus::Valid {
            return Err(AppError::Conflict(format!(
                "submission '{}' is '{}' and cannot be committed",
                submission.id,
                submission.status.as_str()
            )));
        }
        if submission.version != batch.expected_version {
            return Err(AppError::Conflict(format!(
                "submission '{}' changed since version {}",
                submission.id, batch.expected_version
            )));
        }

        let stored: HashSet<&str> = rows.values().map(|row| row.system_id.as_str()).collect();
        if let Some(missing) = batch
            .updates
            .iter()
            .map(|change| change.system_id.as_str())
            .chain(batch.deletes.iter().map(String::as_str))
            .find(|system_id| !stored.contains(system_id))
        {
            return Err(AppError::Conflict(format!(
                "record '{missing}' no longer exists"
            )));
        }

        let deleted: HashSet<&str> = batch.deletes.iter().map(String::as_str).collect();
        let existing: HashSet<&str> = rows
            .values()
            .filter(|row| !deleted.contains(row.system_id.as_str()))
            .map(|row| row.system_id.as_str())
            .collect();
        if let Some(duplicate) = batch
            .inserts
            .iter()
            .find(|insert| existing.contains(insert.system_id.as_str()))
        {
            return Err(AppError::Conflict(format!(
                "system id '{}' is already in use",
                duplicate.system_id
            )));
        }

        rows.retain(|_, row| !deleted.contains(row.system_id.as_str()));

        for change in &batch.updates {
            let Some(row) = rows
                .values_mut()
                .find(|row| row.system_id == change.system_id)
            else {
                continue;
            };
            row.data = change.data.clone();
            row.is_valid = true;
            row.last_valid_schema_id = Some(batch.dictionary_id);
            row.updated_by = Some(batch.committed_by.clone());
        }
        submitted_data::apply_validity(&mut rows, &batch.validity);

        for insert in batch.inserts {
            let id = self.next_id();
            rows.insert(
                id,
                SubmittedData {
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
                },
            );
        }

        submission.status = SubmissionStatus::Committed;
        submission.version += 1;
        submission.updated_by = Some(batch.committed_by);
        submission.updated_at = Some(Utc::now());
        Ok(())
    }
}
