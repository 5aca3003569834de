use super::*;

impl PostgresSubmissionStore {
    pub(super) async fn list_submitted_data_impl(
        &self,
        query: SubmittedDataQuery,
    ) -> AppResult<SubmittedDataPage> {
        let filter = r#"
            WHERE category_id = $1
              AND ($2::text IS NULL OR organization = $2)
              AND (cardinality($3::text[]) = 0 OR entity_name = ANY($3))
        "#;

        let total_records: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM submitted_data {filter}"))
                .bind(query.category_id.as_i64())
                .bind(query.organization.as_deref())
                .bind(&query.entity_names)
                .fetch_one(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to count submitted data of category '{}': {error}",
                        query.category_id
                    ))
                })?;

        let offset = i64::try_from(query.offset()).map_err(|_| {
            AppError::Validation(format!("page {} is out of range", query.page))
        })?;
        let rows = sqlx::query_as::<_, SubmittedDataRow>(&format!(
            "SELECT {SUBMITTED_DATA_COLUMNS} FROM submitted_data {filter} \
             ORDER BY id LIMIT $4 OFFSET $5"
        ))
        .bind(query.category_id.as_i64())
        .bind(query.organization.as_deref())
        .bind(&query.entity_names)
        .bind(i64::from(query.page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list submitted data of category '{}': {error}",
                query.category_id
            ))
        })?;

        Ok(SubmittedDataPage {
            records: rows
                .into_iter()
                .map(SubmittedData::try_from)
                .collect::<AppResult<_>>()?,
            total_records: u64::try_from(total_records).unwrap_or_default(),
        })
    }

    pub(super) async fn find_by_system_id_impl(
        &self,
        system_id: &str,
    ) -> AppResult<Option<SubmittedData>> {
        let row = sqlx::query_as::<_, SubmittedDataRow>(&format!(
            "SELECT {SUBMITTED_DATA_COLUMNS} FROM submitted_data WHERE system_id = $1"
        ))
        .bind(system_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load submitted data '{system_id}': {error}"
            ))
        })?;

        row.map(SubmittedData::try_from).transpose()
    }

    pub(super) async fn find_by_entities_impl(
        &self,
        category_id: CategoryId,
        organization: Option<&str>,
        entity_names: &[String],
    ) -> AppResult<Vec<SubmittedData>> {
        let rows = sqlx::query_as::<_, SubmittedDataRow>(&format!(
            r#"
            SELECT {SUBMITTED_DATA_COLUMNS}
            FROM submitted_data
            WHERE category_id = $1
              AND ($2::text IS NULL OR organization = $2)
              AND entity_name = ANY($3)
            ORDER BY id
            "#
        ))
        .bind(category_id.as_i64())
        .bind(organization)
        .bind(entity_names)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load submitted data of category '{category_id}': {error}"
            ))
        })?;

        rows.into_iter().map(SubmittedData::try_from).collect()
    }

    pub(super) async fn find_by_category_impl(
        &self,
        category_id: CategoryId,
    ) -> AppResult<Vec<SubmittedData>> {
        let rows = sqlx::query_as::<_, SubmittedDataRow>(&format!(
            "SELECT {SUBMITTED_DATA_COLUMNS} FROM submitted_data WHERE category_id = $1 ORDER BY id"
        ))
        .bind(category_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load submitted data of category '{category_id}': {error}"
            ))
        })?;

        rows.into_iter().map(SubmittedData::try_from).collect()
    }

    pub(super) async fn update_validity_impl(&self, changes: Vec<ValidityChange>) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start validity update transaction: {error}"
            ))
        })?;

        for change in &changes {
            apply_validity(&mut transaction, change).await?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit validity update transaction: {error}"
            ))
        })
    }
}

pub(super) async fn apply_validity(
    transaction: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    change: &ValidityChange,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE submitted_data
        SET is_valid = $2,
            last_valid_schema_id = COALESCE($3, last_valid_schema_id),
            updated_at = now()
        WHERE system_id = $1
        "#,
    )
    .bind(change.system_id.as_str())
    .bind(change.is_valid)
    .bind(change.last_valid_schema_id.map(|dictionary_id| dictionary_id.as_i64()))
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to update validity of submitted data '{}': {error}",
            change.system_id
        ))
    })?;

    Ok(())
}
