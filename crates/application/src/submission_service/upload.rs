use super::*;

impl SubmissionService {
    /// Stages uploaded records in the organization's active submission.
    ///
    /// A submission is opened when none is active. Records identical to records
    /// already staged are dropped. Entities unknown to the active dictionary are
    /// rejected; unknown fields become record errors.
    pub async fn upload_submission(
        &self,
        actor: &str,
        input: UploadSubmissionInput,
    ) -> AppResult<Submission> {
        let organization = require_organization(input.organization.as_str())?;
        if input.batches.iter().all(|batch| batch.records.is_empty()) {
            return Err(AppError::Validation(
                "upload contains no records".to_owned(),
            ));
        }

        let (category, dictionary) = self
            .category_service
            .get_category_with_dictionary(input.category_id)
            .await?;

        let mut inserts: BTreeMap<String, SubmissionInsert> = BTreeMap::new();
        for batch in input.batches {
            dictionary.require_schema(batch.entity_name.as_str())?;
            if batch.records.is_empty() {
                continue;
            }

            let incoming = BTreeMap::from([(
                batch.entity_name,
                SubmissionInsert {
                    batch_name: batch.batch_name,
                    records: batch.records,
                },
            )]);
            inserts = merge_insert_batches(&inserts, &incoming);
        }

        let submission = self
            .open_or_create_submission(actor, &category, &dictionary, organization)
            .await?;
        let submission = self
            .stage_and_validate(
                actor,
                submission,
                &dictionary,
                &SubmissionData {
                    inserts,
                    ..SubmissionData::default()
                },
            )
            .await?;

        info!(
            submission_id = %submission.id,
            category_id = %category.id(),
            status = submission.status.as_str(),
            "staged upload"
        );

        Ok(submission)
    }
}
