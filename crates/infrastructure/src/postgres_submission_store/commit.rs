use std::collections::BTreeSet;

use super::*;

impl PostgresSubmissionStore {
    pub(super) async fn commit_submission_impl(&self, batch: CommitBatch) -> AppResult<()> {
        let submission_id = batch.submission_id;
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start commit transaction for submission '{submission_id}': {error}"
            ))
        })?;

        let locked: Option<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, version
            FROM submissions
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(submission_id.as_i64())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to lock submission '{submission_id}': {error}"
            ))
        })?;

        let Some((status, version)) = locked else {
            return Err(AppError::NotFound(format!(
                "submission '{submission_id}' does not exist"
            )));
        };
        if SubmissionStatus::from_str(status.as_str())? != SubmissionStatus::Valid {
            return Err(AppError::Conflict(format!(
                "submission '{submission_id}' is '{status}' and cannot be committed"
            )));
        }
        if version != batch.expected_version {
            return Err(AppError::Conflict(format!(
                "submission '{submission_id}' changed since version {}",
                batch.expected_version
            )));
        }

        if !batch.deletes.is_empty() {
            let expected: BTreeSet<&str> = batch.deletes.iter().map(String::as_str).collect();
            let deleted = sqlx::query("DELETE FROM submitted_data WHERE system_id = ANY($1)")
                .bind(&batch.deletes)
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to delete submitted data for submission '{submission_id}': {error}"
                    ))
                })?;
            if deleted.rows_affected() != expected.len() as u64 {
                return Err(AppError::Conflict(format!(
                    "records deleted by submission '{submission_id}' no longer exist"
                )));
            }
        }

        for change in &batch.updates {
            let updated = sqlx::query(
                r#"
                UPDATE submitted_data
                SET data = $2,
                    is_valid = TRUE,
                    last_valid_schema_id = $3,
                    updated_by = $4,
                    updated_at = now()
                WHERE system_id = $1
                "#,
            )
            .bind(change.system_id.as_str())
            .bind(record_json(&change.data))
            .bind(batch.dictionary_id.as_i64())
            .bind(batch.committed_by.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to update submitted data '{}': {error}",
                    change.system_id
                ))
            })?;
            if updated.rows_affected() != 1 {
                return Err(AppError::Conflict(format!(
                    "record '{}' no longer exists",
                    change.system_id
                )));
            }
        }

        for change in &batch.validity {
            submitted_data::apply_validity(&mut transaction, change).await?;
        }

        for insert in &batch.inserts {
            let result = sqlx::query(
                r#"
                INSERT INTO submitted_data (
                    system_id,
                    category_id,
                    entity_name,
                    organization,
                    data,
                    is_valid,
                    original_schema_id,
                    last_valid_schema_id,
                    created_by
                )
                VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6, $7)
                "#,
            )
            .bind(insert.system_id.as_str())
            .bind(batch.category_id.as_i64())
            .bind(insert.entity_name.as_str())
            .bind(insert.organization.as_str())
            .bind(record_json(&insert.data))
            .bind(batch.dictionary_id.as_i64())
            .bind(batch.committed_by.as_str())
            .execute(&mut *transaction)
            .await;

            match result {
                Ok(_) => {}
                Err(error) if is_unique_violation(&error) => {
                    return Err(AppError::Conflict(format!(
                        "system id '{}' is already in use",
                        insert.system_id
                    )));
                }
                Err(error) => {
                    return Err(AppError::Internal(format!(
                        "failed to insert submitted data '{}': {error}",
                        insert.system_id
                    )));
                }
            }
        }

        sqlx::query(
            r#"
            UPDATE submissions
            SET status = $2,
                updated_by = $3,
                updated_at = now(),
                version = version + 1
            WHERE id = $1
            "#,
        )
        .bind(submission_id.as_i64())
        .bind(SubmissionStatus::Committed.as_str())
        .bind(batch.committed_by.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to mark submission '{submission_id}' committed: {error}"
            ))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit transaction for submission '{submission_id}': {error}"
            ))
        })
    }
}
