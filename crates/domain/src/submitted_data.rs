use dictum_core::{CategoryId, DictionaryId};
use serde::{Deserialize, Serialize};

use crate::record::DataRecord;

/// Durable committed record belonging to one entity and organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedData {
    /// Storage row identifier.
    pub id: i64,
    /// Globally unique identifier minted at first commit.
    pub system_id: String,
    /// Owning category.
    pub category_id: CategoryId,
    /// Entity the record belongs to.
    pub entity_name: String,
    /// Owning organization.
    pub organization: String,
    /// Field values.
    pub data: DataRecord,
    /// Result of the most recent validation against the active dictionary.
    pub is_valid: bool,
    /// Dictionary version the record was first validated against.
    pub original_schema_id: DictionaryId,
    /// Dictionary version the record last passed validation against.
    pub last_valid_schema_id: Option<DictionaryId>,
    /// Subject that created the record.
    pub created_by: String,
    /// Subject that last changed the record.
    pub updated_by: Option<String>,
}
