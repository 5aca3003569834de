use super::*;

impl SubmittedDataService {
    /// Validates every committed record of a category against its active dictionary.
    ///
    /// Record sets are validated per organization and entity. Records of entities
    /// the dictionary no longer declares become invalid.
    pub async fn revalidate_category(
        &self,
        category_id: CategoryId,
    ) -> AppResult<RevalidationSummary> {
        let (category, dictionary) = self
            .category_service
            .get_category_with_dictionary(category_id)
            .await?;
        let rows = self.repository.find_by_category(category.id()).await?;

        let mut changes = Vec::new();
        let mut valid = 0;
        let mut invalid = 0;

        for (organization, organization_rows) in group_by(rows, |row| row.organization.clone()) {
            for (entity_name, entity_rows) in
                group_by(organization_rows, |row| row.entity_name.clone())
            {
                let errors_by_index = match dictionary.schema(entity_name.as_str()) {
                    Some(schema) => {
                        let records: Vec<_> =
                            entity_rows.iter().map(|row| row.data.clone()).collect();
                        let result = self
                            .schema_validator
                            .validate(entity_name.as_str(), &records, schema)
                            .await?;
                        Some(group_errors_by_index(find_invalid_record_errors_by_entity(
                            &result,
                            entity_name.as_str(),
                        )))
                    }
                    None => {
                        warn!(
                            category_id = %category.id(),
                            organization = %organization,
                            entity = %entity_name,
                            "entity is no longer declared by the active dictionary"
                        );
                        None
                    }
                };

                for (index, row) in entity_rows.into_iter().enumerate() {
                    let is_valid = errors_by_index
                        .as_ref()
                        .is_some_and(|errors| !has_error_at_index(errors, index));
                    if is_valid {
                        valid += 1;
                    } else {
                        invalid += 1;
                    }

                    let last_valid_schema_id = is_valid.then_some(dictionary.id());
                    let unchanged = row.is_valid == is_valid
                        && (!is_valid || row.last_valid_schema_id == last_valid_schema_id);
                    if !unchanged {
                        changes.push(ValidityChange {
                            system_id: row.system_id,
                            is_valid,
                            last_valid_schema_id,
                        });
                    }
                }
            }
        }

        let changed = changes.len();
        if !changes.is_empty() {
            self.repository.update_validity(changes).await?;
        }

        info!(
            category_id = %category.id(),
            dictionary_id = %dictionary.id(),
            valid,
            invalid,
            changed,
            "revalidated category"
        );

        Ok(RevalidationSummary {
            category_id: category.id(),
            dictionary_id: dictionary.id(),
            valid,
            invalid,
        })
    }
}
