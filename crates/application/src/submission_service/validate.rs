use super::*;

/// Outcome of validating staged data against the full record sets it touches.
pub(super) struct ValidationPass {
    pub(super) classification: ValidationClassification,
    pub(super) persisted: Vec<SubmittedData>,
}

impl SubmissionService {
    pub(super) async fn validate_staged(
        &self,
        submission: &Submission,
        dictionary: &Dictionary,
    ) -> AppResult<ValidationPass> {
        let data = &submission.data;
        let touched: BTreeSet<String> = data
            .inserts
            .keys()
            .chain(data.updates.keys())
            .chain(data.deletes.keys())
            .cloned()
            .collect();
        for entity_name in &touched {
            dictionary.require_schema(entity_name)?;
        }

        let touched: Vec<String> = touched.into_iter().collect();
        let persisted = if touched.is_empty() {
            Vec::new()
        } else {
            self.submitted_data_repository
                .find_by_entities(
                    submission.category_id,
                    Some(submission.organization.as_str()),
                    &touched,
                )
                .await?
        };

        let groups = group_by_entity_with_full_context(EntityDataSources {
            submission_id: submission.id,
            inserts: &data.inserts,
            updates: &data.updates,
            deletes: &data.deletes,
            submitted_data: &persisted,
        });

        let mut results = Vec::with_capacity(groups.records.len());
        for (entity_name, records) in &groups.records {
            let schema = dictionary.require_schema(entity_name)?;
            results.push(
                self.schema_validator
                    .validate(entity_name, records, schema)
                    .await?,
            );
        }

        let combined = ValidationResult::combine(results);
        let mut classification = classify_validation_result(&combined, &groups.references)?;
        let unrecognized = unrecognized_field_errors(data, dictionary)?;
        classification.submission_errors = classification.submission_errors.merge(&unrecognized);

        info!(
            submission_id = %submission.id,
            entities = groups.records.len(),
            has_errors = classification.submission_errors.has_errors(),
            invalid_committed = classification.invalid_system_ids.len(),
            "validated staged data"
        );

        Ok(ValidationPass {
            classification,
            persisted,
        })
    }
}

fn unrecognized_field_errors(
    data: &SubmissionData,
    dictionary: &Dictionary,
) -> AppResult<SubmissionErrors> {
    let mut errors = SubmissionErrors::default();

    for (entity_name, insert) in &data.inserts {
        let schema = dictionary.require_schema(entity_name)?;
        let found: Vec<_> = insert
            .records
            .iter()
            .enumerate()
            .flat_map(|(index, record)| find_unrecognized_fields(schema, index, record))
            .collect();
        if !found.is_empty() {
            errors.inserts.insert(entity_name.clone(), found);
        }
    }

    for (entity_name, updates) in &data.updates {
        let schema = dictionary.require_schema(entity_name)?;
        let found: Vec<_> = updates
            .iter()
            .enumerate()
            .flat_map(|(index, update)| find_unrecognized_fields(schema, index, &update.new))
            .collect();
        if !found.is_empty() {
            errors.updates.insert(entity_name.clone(), found);
        }
    }

    Ok(errors)
}
