use dictum_application::SystemIdGenerator;
use dictum_core::{AppError, AppResult};
use dictum_domain::DataRecord;
use uuid::Uuid;

/// Mints system ids as a fixed prefix followed by an uppercase random UUID.
#[derive(Debug, Clone)]
pub struct UuidSystemIdGenerator {
    prefix: String,
}

impl UuidSystemIdGenerator {
    /// Creates a generator using `prefix` for every minted id.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim().to_uppercase(),
        }
    }
}

impl SystemIdGenerator for UuidSystemIdGenerator {
    fn generate(&self, _entity_name: &str, _record: &DataRecord) -> AppResult<String> {
        let suffix = Uuid::new_v4().simple().to_string().to_uppercase();
        Ok(format!("{}{suffix}", self.prefix))
    }
}

/// Generator used when identifier minting is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSystemIdGenerator;

impl SystemIdGenerator for DisabledSystemIdGenerator {
    fn generate(&self, entity_name: &str, _record: &DataRecord) -> AppResult<String> {
        Err(AppError::NotImplemented(format!(
            "system id generation is not configured, cannot mint ids for '{entity_name}'"
        )))
    }
}
