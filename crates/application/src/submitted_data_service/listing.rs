use super::*;

impl SubmittedDataService {
    /// Lists one page of a category's submitted data.
    ///
    /// Unrecognized view values fall back to the flat view. Compound views list
    /// the category's centric entity with dependents nested.
    pub async fn list_by_category(
        &self,
        input: ListSubmittedDataInput,
    ) -> AppResult<SubmittedDataListing> {
        validate_pagination(input.page, input.page_size)?;
        let (category, dictionary) = self
            .category_service
            .get_category_with_dictionary(input.category_id)
            .await?;

        let view = normalize_view_mode(&input.view).unwrap_or_default();
        let entity_names = resolve_entity_scope(
            &EntityFilterOptions {
                view,
                entity_names: input.entity_names,
            },
            category.default_centric_entity(),
        );
        if view == ViewMode::Compound && entity_names.is_empty() {
            return Err(AppError::Validation(format!(
                "category '{}' has no default centric entity for compound views",
                category.id()
            )));
        }

        let organization = input.organization;
        let page = self
            .repository
            .list_submitted_data(SubmittedDataQuery {
                category_id: category.id(),
                organization: organization.clone(),
                entity_names: entity_names.clone(),
                page: input.page,
                page_size: input.page_size,
            })
            .await?;

        let records = match view {
            ViewMode::Flat => SubmittedDataView::Flat(page.records),
            ViewMode::Compound => {
                let relations =
                    SchemaRelationIndex::from_schemas(dictionary.definition().schemas());
                let descendants = descendant_entities(&relations, &entity_names);
                let related = if descendants.is_empty() {
                    Vec::new()
                } else {
                    self.repository
                        .find_by_entities(category.id(), organization.as_deref(), &descendants)
                        .await?
                };
                SubmittedDataView::Compound(nest_records(page.records, related, &relations))
            }
        };

        Ok(SubmittedDataListing {
            view,
            records,
            page: input.page,
            page_size: input.page_size,
            total_records: page.total_records,
            total_pages: page.total_records.div_ceil(u64::from(input.page_size)),
        })
    }

    /// Lists one page of an organization's submitted data in a category.
    pub async fn list_by_organization(
        &self,
        input: ListSubmittedDataInput,
    ) -> AppResult<SubmittedDataListing> {
        let has_organization = input
            .organization
            .as_deref()
            .is_some_and(|organization| !organization.trim().is_empty());
        if !has_organization {
            return Err(AppError::Validation(
                "organization must not be empty".to_owned(),
            ));
        }

        self.list_by_category(input).await
    }

    /// Returns one record of a category.
    pub async fn get_by_system_id(
        &self,
        category_id: CategoryId,
        system_id: &str,
    ) -> AppResult<SubmittedData> {
        self.category_service.get_category(category_id).await?;

        self.repository
            .find_by_system_id(system_id)
            .await?
            .filter(|row| row.category_id == category_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "submitted data '{system_id}' does not exist in category '{category_id}'"
                ))
            })
    }
}

fn validate_pagination(page: u32, page_size: u32) -> AppResult<()> {
    if page == 0 {
        return Err(AppError::Validation("page must be at least 1".to_owned()));
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(AppError::Validation(format!(
            "page size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    Ok(())
}

/// Entities reachable through child relations, excluding the roots unless a
/// relation leads back to them.
fn descendant_entities(relations: &SchemaRelationIndex, roots: &[String]) -> Vec<String> {
    let mut found: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<&str> = roots.iter().map(String::as_str).collect();

    while let Some(entity_name) = queue.pop_front() {
        for child in relations.children_of(entity_name) {
            if found.insert(child.schema_name.clone()) {
                queue.push_back(child.schema_name.as_str());
            }
        }
    }

    found.into_iter().collect()
}

/// Nests related rows under each listed record, within its organization.
fn nest_records(
    records: Vec<SubmittedData>,
    related: Vec<SubmittedData>,
    relations: &SchemaRelationIndex,
) -> Vec<CompoundRecord> {
    let by_organization: BTreeMap<String, BTreeMap<String, Vec<SubmittedData>>> =
        group_by(related, |row| row.organization.clone())
            .into_iter()
            .map(|(organization, rows)| {
                (organization, group_by(rows, |row| row.entity_name.clone()))
            })
            .collect();
    let empty = BTreeMap::new();

    records
        .iter()
        .map(|record| {
            let rows_by_entity = by_organization
                .get(record.organization.as_str())
                .unwrap_or(&empty);
            build_compound_record(record, rows_by_entity, relations)
        })
        .collect()
}
