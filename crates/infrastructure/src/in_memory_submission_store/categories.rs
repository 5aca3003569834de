use super::*;

impl InMemorySubmissionStore {
    pub(super) async fn find_dictionary_impl(
        &self,
        name: &str,
        version: &str,
    ) -> AppResult<Option<Dictionary>> {
        Ok(self
            .dictionaries
            .read()
            .await
            .values()
            .find(|dictionary| dictionary.name() == name && dictionary.version() == version)
            .cloned())
    }

    pub(super) async fn save_dictionary_impl(
        &self,
        definition: DictionaryDefinition,
    ) -> AppResult<Dictionary> {
        let mut dictionaries = self.dictionaries.write().await;
        let exists = dictionaries.values().any(|dictionary| {
            dictionary.name() == definition.name().as_str()
                && dictionary.version() == definition.version().as_str()
        });
        if exists {
            return Err(AppError::Conflict(format!(
                "dictionary '{}' version '{}' already exists",
                definition.name().as_str(),
                definition.version().as_str()
            )));
        }

        let dictionary = Dictionary::new(DictionaryId::new(self.next_id()), definition);
        dictionaries.insert(dictionary.id(), dictionary.clone());
        Ok(dictionary)
    }

    pub(super) async fn find_category_by_name_impl(
        &self,
        name: &str,
    ) -> AppResult<Option<Category>> {
        Ok(self
            .categories
            .read()
            .await
            .values()
            .find(|category| category.name().as_str() == name)
            .cloned())
    }

    pub(super) async fn create_category_impl(&self, category: NewCategory) -> AppResult<Category> {
        if !self
            .dictionaries
            .read()
            .await
            .contains_key(&category.active_dictionary_id)
        {
            return Err(AppError::NotFound(format!(
                "dictionary '{}' does not exist",
                category.active_dictionary_id
            )));
        }

        let mut categories = self.categories.write().await;
        if categories
            .values()
            .any(|stored| stored.name().as_str() == category.name)
        {
            return Err(AppError::Conflict(format!(
                "category '{}' already exists",
                category.name
            )));
        }

        let created = Category::new(
            CategoryId::new(self.next_id()),
            category.name,
            category.active_dictionary_id,
            category.default_centric_entity,
        )?;
        categories.insert(created.id(), created.clone());
        Ok(created)
    }

    pub(super) async fn update_category_impl(
        &self,
        category_id: CategoryId,
        active_dictionary_id: DictionaryId,
        default_centric_entity: Option<String>,
    ) -> AppResult<Category> {
        let mut categories = self.categories.write().await;
        let Some(stored) = categories.get_mut(&category_id) else {
            return Err(AppError::NotFound(format!(
                "category '{category_id}' does not exist"
            )));
        };

        *stored = Category::new(
            category_id,
            stored.name().as_str(),
            active_dictionary_id,
            default_centric_entity,
        )?;
        Ok(stored.clone())
    }
}
