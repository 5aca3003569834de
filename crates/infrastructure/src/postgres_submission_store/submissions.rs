use super::*;

impl PostgresSubmissionStore {
    pub(super) async fn create_submission_impl(
        &self,
        submission: NewSubmission,
    ) -> AppResult<Submission> {
        let result = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            INSERT INTO submissions (category_id, dictionary_id, organization, status, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(submission.category_id.as_i64())
        .bind(submission.dictionary_id.as_i64())
        .bind(submission.organization.as_str())
        .bind(SubmissionStatus::Open.as_str())
        .bind(submission.created_by.as_str())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Submission::try_from(row),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(format!(
                "organization '{}' already has an active submission in category '{}'",
                submission.organization, submission.category_id
            ))),
            Err(error) => Err(AppError::Internal(format!(
                "failed to create submission for organization '{}': {error}",
                submission.organization
            ))),
        }
    }

    pub(super) async fn find_submission_impl(
        &self,
        submission_id: SubmissionId,
    ) -> AppResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            SELECT {SUBMISSION_COLUMNS}
            FROM submissions
            WHERE id = $1
            "#
        ))
        .bind(submission_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load submission '{submission_id}': {error}"
            ))
        })?;

        row.map(Submission::try_from).transpose()
    }

    pub(super) async fn find_active_submission_impl(
        &self,
        category_id: CategoryId,
        organization: &str,
    ) -> AppResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            SELECT {SUBMISSION_COLUMNS}
            FROM submissions
            WHERE category_id = $1
              AND organization = $2
              AND status IN ('OPEN', 'VALID', 'INVALID')
            "#
        ))
        .bind(category_id.as_i64())
        .bind(organization)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find active submission of organization '{organization}' in category '{category_id}': {error}"
            ))
        })?;

        row.map(Submission::try_from).transpose()
    }

    pub(super) async fn save_submission_impl(
        &self,
        submission: &Submission,
    ) -> AppResult<Submission> {
        let data = serde_json::to_value(&submission.data).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize staged data of submission '{}': {error}",
                submission.id
            ))
        })?;
        let errors = serde_json::to_value(&submission.errors).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize errors of submission '{}': {error}",
                submission.id
            ))
        })?;

        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            UPDATE submissions
            SET dictionary_id = $2,
                status = $3,
                data = $4,
                errors = $5,
                updated_by = $6,
                updated_at = $7,
                version = version + 1
            WHERE id = $1
              AND status IN ('OPEN', 'VALID', 'INVALID')
              AND version = $8
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(submission.id.as_i64())
        .bind(submission.dictionary_id.as_i64())
        .bind(submission.status.as_str())
        .bind(data)
        .bind(errors)
        .bind(submission.updated_by.as_deref())
        .bind(submission.updated_at)
        .bind(submission.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save submission '{}': {error}",
                submission.id
            ))
        })?;

        if let Some(row) = row {
            return Submission::try_from(row);
        }

        match self.find_submission_impl(submission.id).await? {
            Some(stored) if !stored.status.is_active() => Err(AppError::Conflict(format!(
                "submission '{}' is '{}' and can no longer change",
                stored.id,
                stored.status.as_str()
            ))),
            Some(stored) => Err(AppError::Conflict(format!(
                "submission '{}' changed since version {}",
                stored.id, submission.version
            ))),
            None => Err(AppError::NotFound(format!(
                "submission '{}' does not exist",
                submission.id
            ))),
        }
    }
}
