use super::*;

impl PostgresSubmissionStore {
    pub(super) async fn find_dictionary_impl(
        &self,
        name: &str,
        version: &str,
    ) -> AppResult<Option<Dictionary>> {
        let row = sqlx::query_as::<_, DictionaryRow>(
            r#"
            SELECT id, name, version, schemas
            FROM dictionaries
            WHERE name = $1 AND version = $2
            "#,
        )
        .bind(name)
        .bind(version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find dictionary '{name}' version '{version}': {error}"
            ))
        })?;

        row.map(Dictionary::try_from).transpose()
    }

    pub(super) async fn get_dictionary_impl(
        &self,
        dictionary_id: DictionaryId,
    ) -> AppResult<Option<Dictionary>> {
        let row = sqlx::query_as::<_, DictionaryRow>(
            r#"
            SELECT id, name, version, schemas
            FROM dictionaries
            WHERE id = $1
            "#,
        )
        .bind(dictionary_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load dictionary '{dictionary_id}': {error}"
            ))
        })?;

        row.map(Dictionary::try_from).transpose()
    }

    pub(super) async fn save_dictionary_impl(
        &self,
        definition: DictionaryDefinition,
    ) -> AppResult<Dictionary> {
        let schemas = serde_json::to_value(definition.schemas()).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize schemas of dictionary '{}': {error}",
                definition.name().as_str()
            ))
        })?;

        let result = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO dictionaries (name, version, schemas)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(definition.name().as_str())
        .bind(definition.version().as_str())
        .bind(schemas)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Ok(Dictionary::new(DictionaryId::new(id), definition)),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(format!(
                "dictionary '{}' version '{}' already exists",
                definition.name().as_str(),
                definition.version().as_str()
            ))),
            Err(error) => Err(AppError::Internal(format!(
                "failed to save dictionary '{}': {error}",
                definition.name().as_str()
            ))),
        }
    }

    pub(super) async fn find_category_impl(
        &self,
        category_id: CategoryId,
    ) -> AppResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, name, active_dictionary_id, default_centric_entity
            FROM dictionary_categories
            WHERE id = $1
            "#,
        )
        .bind(category_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load category '{category_id}': {error}"))
        })?;

        row.map(Category::try_from).transpose()
    }

    pub(super) async fn find_category_by_name_impl(
        &self,
        name: &str,
    ) -> AppResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, name, active_dictionary_id, default_centric_entity
            FROM dictionary_categories
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find category '{name}': {error}"))
        })?;

        row.map(Category::try_from).transpose()
    }

    pub(super) async fn list_categories_impl(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"
            SELECT id, name, active_dictionary_id, default_centric_entity
            FROM dictionary_categories
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list categories: {error}")))?;

        rows.into_iter().map(Category::try_from).collect()
    }

    pub(super) async fn create_category_impl(&self, category: NewCategory) -> AppResult<Category> {
        let result = sqlx::query_as::<_, CategoryRow>(
            r#"
            INSERT INTO dictionary_categories (name, active_dictionary_id, default_centric_entity)
            VALUES ($1, $2, $3)
            RETURNING id, name, active_dictionary_id, default_centric_entity
            "#,
        )
        .bind(category.name.as_str())
        .bind(category.active_dictionary_id.as_i64())
        .bind(category.default_centric_entity.as_deref())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Category::try_from(row),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(format!(
                "category '{}' already exists",
                category.name
            ))),
            Err(error) => Err(AppError::Internal(format!(
                "failed to create category '{}': {error}",
                category.name
            ))),
        }
    }

    pub(super) async fn update_category_impl(
        &self,
        category_id: CategoryId,
        active_dictionary_id: DictionaryId,
        default_centric_entity: Option<String>,
    ) -> AppResult<Category> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r#"
            UPDATE dictionary_categories
            SET active_dictionary_id = $2,
                default_centric_entity = $3,
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, active_dictionary_id, default_centric_entity
            "#,
        )
        .bind(category_id.as_i64())
        .bind(active_dictionary_id.as_i64())
        .bind(default_centric_entity.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update category '{category_id}': {error}"
            ))
        })?;

        row.map(Category::try_from)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("category '{category_id}' does not exist")))
    }
}
