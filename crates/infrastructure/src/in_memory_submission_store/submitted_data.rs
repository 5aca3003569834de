use super::*;

impl InMemorySubmissionStore {
    pub(super) async fn list_submitted_data_impl(
        &self,
        query: SubmittedDataQuery,
    ) -> AppResult<SubmittedDataPage> {
        let rows = self.submitted_data.read().await;
        let matching: Vec<&SubmittedData> = rows
            .values()
            .filter(|row| row.category_id == query.category_id)
            .filter(|row| {
                query
                    .organization
                    .as_deref()
                    .is_none_or(|organization| row.organization == organization)
            })
            .filter(|row| {
                query.entity_names.is_empty() || query.entity_names.contains(&row.entity_name)
            })
            .collect();

        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let page_size = usize::try_from(query.page_size).unwrap_or(usize::MAX);
        Ok(SubmittedDataPage {
            total_records: u64::try_from(matching.len()).unwrap_or(u64::MAX),
            records: matching
                .into_iter()
                .skip(offset)
                .take(page_size)
                .cloned()
                .collect(),
        })
    }

    pub(super) async fn find_by_entities_impl(
        &self,
        category_id: CategoryId,
        organization: Option<&str>,
        entity_names: &[String],
    ) -> AppResult<Vec<SubmittedData>> {
        Ok(self
            .submitted_data
            .read()
            .await
            .values()
            .filter(|row| row.category_id == category_id)
            .filter(|row| organization.is_none_or(|organization| row.organization == organization))
            .filter(|row| entity_names.contains(&row.entity_name))
            .cloned()
            .collect())
    }
}

pub(super) fn apply_validity(rows: &mut BTreeMap<i64, SubmittedData>, changes: &[ValidityChange]) {
    for change in changes {
        if let Some(row) = rows
            .values_mut()
            .find(|row| row.system_id == change.system_id)
        {
            row.is_valid = change.is_valid;
            if let Some(dictionary_id) = change.last_valid_schema_id {
                row.last_valid_schema_id = Some(dictionary_id);
            }
        }
    }
}
