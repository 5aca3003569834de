use std::sync::Arc;

use dictum_core::{AppError, AppResult, CategoryId, DictionaryId};
use dictum_domain::{Category, Dictionary};
use tracing::info;

use crate::submission_ports::{
    CategoryRepository, NewCategory, RegisterDictionaryInput, RegisterDictionaryResult,
    SchemaProvider,
};

/// Application service for categories and their dictionary versions.
#[derive(Clone)]
pub struct CategoryService {
    repository: Arc<dyn CategoryRepository>,
    schema_provider: Arc<dyn SchemaProvider>,
}

impl CategoryService {
    /// Creates a category service from its collaborators.
    #[must_use]
    pub fn new(
        repository: Arc<dyn CategoryRepository>,
        schema_provider: Arc<dyn SchemaProvider>,
    ) -> Self {
        Self {
            repository,
            schema_provider,
        }
    }

    /// Registers a dictionary version as the active dictionary of a category.
    ///
    /// The dictionary is fetched from the schema service unless the same name and
    /// version were registered before. Unknown categories are created.
    pub async fn register_dictionary(
        &self,
        input: RegisterDictionaryInput,
    ) -> AppResult<RegisterDictionaryResult> {
        let category_name = input.category_name.trim();
        if category_name.is_empty() {
            return Err(AppError::Validation(
                "category name must not be empty".to_owned(),
            ));
        }

        let dictionary = self
            .resolve_dictionary(
                input.dictionary_name.as_str(),
                input.dictionary_version.as_str(),
            )
            .await?;

        if let Some(centric_entity) = input.default_centric_entity.as_deref() {
            dictionary.require_schema(centric_entity)?;
        }

        let existing = self.repository.find_category_by_name(category_name).await?;
        let (category, active_dictionary_changed) = match existing {
            None => {
                let category = self
                    .repository
                    .create_category(NewCategory {
                        name: category_name.to_owned(),
                        active_dictionary_id: dictionary.id(),
                        default_centric_entity: input.default_centric_entity,
                    })
                    .await?;
                (category, true)
            }
            Some(category) => {
                let changed = category.active_dictionary_id() != dictionary.id();
                let centric_changed =
                    category.default_centric_entity() != input.default_centric_entity.as_deref();
                if changed || centric_changed {
                    let updated = self
                        .repository
                        .update_category(
                            category.id(),
                            dictionary.id(),
                            input.default_centric_entity,
                        )
                        .await?;
                    (updated, changed)
                } else {
                    (category, false)
                }
            }
        };

        info!(
            category_id = %category.id(),
            dictionary_id = %dictionary.id(),
            dictionary = dictionary.name(),
            version = dictionary.version(),
            active_dictionary_changed,
            "registered dictionary"
        );

        Ok(RegisterDictionaryResult {
            category,
            dictionary,
            active_dictionary_changed,
        })
    }

    /// Returns one category.
    pub async fn get_category(&self, category_id: CategoryId) -> AppResult<Category> {
        self.repository
            .find_category(category_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("category '{category_id}' does not exist")))
    }

    /// Lists every category.
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.list_categories().await
    }

    /// Returns one dictionary version.
    pub async fn get_dictionary(&self, dictionary_id: DictionaryId) -> AppResult<Dictionary> {
        self.repository
            .get_dictionary(dictionary_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("dictionary '{dictionary_id}' does not exist"))
            })
    }

    /// Returns a category together with its active dictionary.
    pub async fn get_category_with_dictionary(
        &self,
        category_id: CategoryId,
    ) -> AppResult<(Category, Dictionary)> {
        let category = self.get_category(category_id).await?;
        let dictionary = self
            .repository
            .get_dictionary(category.active_dictionary_id())
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "category '{}' points at missing dictionary '{}'",
                    category.id(),
                    category.active_dictionary_id()
                ))
            })?;

        Ok((category, dictionary))
    }

    async fn resolve_dictionary(&self, name: &str, version: &str) -> AppResult<Dictionary> {
        if let Some(dictionary) = self.repository.find_dictionary(name, version).await? {
            return Ok(dictionary);
        }

        let definition = self.schema_provider.fetch_dictionary(name, version).await?;
        if definition.name().as_str() != name || definition.version().as_str() != version {
            return Err(AppError::Internal(format!(
                "schema service returned '{}' version '{}' for '{}' version '{}'",
                definition.name().as_str(),
                definition.version().as_str(),
                name,
                version
            )));
        }

        self.repository.save_dictionary(definition).await
    }
}
