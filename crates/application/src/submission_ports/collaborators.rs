use async_trait::async_trait;
use dictum_core::AppResult;
use dictum_domain::{DataRecord, DictionaryDefinition, SchemaDefinition, ValidationResult};

/// Port for fetching published dictionaries from the schema service.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Fetches one dictionary version.
    ///
    /// Fails with `NotFound` for unknown versions and `ServiceUnavailable`
    /// when the service cannot be reached.
    async fn fetch_dictionary(&self, name: &str, version: &str) -> AppResult<DictionaryDefinition>;
}

/// Port validating the full record set of one entity against its schema.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    /// Validates records in order; reported indexes refer to `records`.
    async fn validate(
        &self,
        entity_name: &str,
        records: &[DataRecord],
        schema: &SchemaDefinition,
    ) -> AppResult<ValidationResult>;
}

/// Port minting system ids for newly committed records.
pub trait SystemIdGenerator: Send + Sync {
    /// Returns a system id unique across every entity.
    ///
    /// Fails with `NotImplemented` when no generation strategy is configured.
    fn generate(&self, entity_name: &str, record: &DataRecord) -> AppResult<String>;
}
