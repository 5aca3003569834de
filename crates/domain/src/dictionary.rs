use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use dictum_core::{AppError, AppResult, CategoryId, DictionaryId, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value types a dictionary field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// UTF-8 string value.
    String,
    /// Whole number value.
    Integer,
    /// Any numeric value.
    Number,
    /// Boolean value.
    Boolean,
}

impl ValueType {
    /// Returns a stable storage value for the value type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Returns whether a single scalar value matches this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

impl FromStr for ValueType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            _ => Err(AppError::Validation(format!(
                "unknown value type '{value}'"
            ))),
        }
    }
}

/// Per-field restrictions declared by a schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRestrictions {
    /// Field must be present and non-empty.
    #[serde(default)]
    pub required: bool,
    /// Closed list of accepted values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_list: Option<Vec<Value>>,
}

/// One field declared by a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    /// Field name as it appears in records.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared value type.
    pub value_type: ValueType,
    /// Whether the field holds a list of values.
    #[serde(default)]
    pub is_array: bool,
    /// Field restrictions.
    #[serde(default)]
    pub restrictions: FieldRestrictions,
}

/// Pair of local and foreign field names in a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyMapping {
    /// Field on the declaring (child) schema.
    pub local: String,
    /// Field on the referenced (parent) schema.
    pub foreign: String,
}

/// Foreign key declared by a child schema against a parent schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRestriction {
    /// Referenced parent schema name.
    pub schema: String,
    /// Field mappings between child and parent.
    pub mappings: Vec<ForeignKeyMapping>,
}

/// Schema-level restrictions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRestrictions {
    /// Foreign keys against other schemas of the same dictionary.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_key: Vec<ForeignKeyRestriction>,
    /// Fields whose combined values must be unique across the record set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_key: Vec<String>,
}

/// Schema definition for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    /// Entity name.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared fields.
    pub fields: Vec<SchemaField>,
    /// Schema-level restrictions.
    #[serde(default)]
    pub restrictions: SchemaRestrictions,
}

impl SchemaDefinition {
    /// Looks up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns the declared field names.
    #[must_use]
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }
}

/// Dictionary content as published by the schema service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryDefinition {
    name: NonEmptyString,
    version: NonEmptyString,
    schemas: Vec<SchemaDefinition>,
}

impl DictionaryDefinition {
    /// Creates a dictionary definition, checking schema and relation consistency.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        schemas: Vec<SchemaDefinition>,
    ) -> AppResult<Self> {
        let name = NonEmptyString::new(name)?;
        let version = NonEmptyString::new(version)?;

        if schemas.is_empty() {
            return Err(AppError::Validation(format!(
                "dictionary '{}' version '{}' declares no schemas",
                name.as_str(),
                version.as_str()
            )));
        }

        let mut schema_names = HashSet::new();
        for schema in &schemas {
            if schema.name.trim().is_empty() {
                return Err(AppError::Validation(
                    "schema name must not be empty".to_owned(),
                ));
            }

            if !schema_names.insert(schema.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "duplicate schema name '{}' in dictionary '{}'",
                    schema.name,
                    name.as_str()
                )));
            }

            let mut field_names = HashSet::new();
            for field in &schema.fields {
                if !field_names.insert(field.name.as_str()) {
                    return Err(AppError::Validation(format!(
                        "duplicate field '{}' in schema '{}'",
                        field.name, schema.name
                    )));
                }
            }

            for unique_field in &schema.restrictions.unique_key {
                if !field_names.contains(unique_field.as_str()) {
                    return Err(AppError::Validation(format!(
                        "unique key field '{}' is not declared by schema '{}'",
                        unique_field, schema.name
                    )));
                }
            }
        }

        for schema in &schemas {
            for foreign_key in &schema.restrictions.foreign_key {
                let parent = schemas
                    .iter()
                    .find(|candidate| candidate.name == foreign_key.schema)
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "schema '{}' references unknown schema '{}'",
                            schema.name, foreign_key.schema
                        ))
                    })?;

                for mapping in &foreign_key.mappings {
                    if schema.field(mapping.local.as_str()).is_none() {
                        return Err(AppError::Validation(format!(
                            "foreign key field '{}.{}' is not declared",
                            schema.name, mapping.local
                        )));
                    }

                    if parent.field(mapping.foreign.as_str()).is_none() {
                        return Err(AppError::Validation(format!(
                            "foreign key target '{}.{}' is not declared",
                            parent.name, mapping.foreign
                        )));
                    }
                }
            }
        }

        Ok(Self {
            name,
            version,
            schemas,
        })
    }

    /// Returns the dictionary name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the dictionary version label.
    #[must_use]
    pub fn version(&self) -> &NonEmptyString {
        &self.version
    }

    /// Returns all schema definitions.
    #[must_use]
    pub fn schemas(&self) -> &[SchemaDefinition] {
        &self.schemas
    }

    /// Looks up a schema by entity name.
    #[must_use]
    pub fn schema(&self, entity_name: &str) -> Option<&SchemaDefinition> {
        self.schemas
            .iter()
            .find(|schema| schema.name == entity_name)
    }
}

/// Persisted, immutable dictionary version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    id: DictionaryId,
    definition: DictionaryDefinition,
}

impl Dictionary {
    /// Creates a persisted dictionary projection.
    #[must_use]
    pub fn new(id: DictionaryId, definition: DictionaryDefinition) -> Self {
        Self { id, definition }
    }

    /// Returns the dictionary identifier.
    #[must_use]
    pub fn id(&self) -> DictionaryId {
        self.id
    }

    /// Returns the dictionary content.
    #[must_use]
    pub fn definition(&self) -> &DictionaryDefinition {
        &self.definition
    }

    /// Returns the dictionary name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name().as_str()
    }

    /// Returns the dictionary version label.
    #[must_use]
    pub fn version(&self) -> &str {
        self.definition.version().as_str()
    }

    /// Looks up a schema by entity name.
    #[must_use]
    pub fn schema(&self, entity_name: &str) -> Option<&SchemaDefinition> {
        self.definition.schema(entity_name)
    }

    /// Looks up a schema, failing when the entity is not declared.
    pub fn require_schema(&self, entity_name: &str) -> AppResult<&SchemaDefinition> {
        self.schema(entity_name).ok_or_else(|| {
            AppError::Validation(format!(
                "entity '{}' is not declared by dictionary '{}' version '{}'",
                entity_name,
                self.name(),
                self.version()
            ))
        })
    }
}

/// Named grouping of dictionary versions with one active version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: NonEmptyString,
    active_dictionary_id: DictionaryId,
    default_centric_entity: Option<NonEmptyString>,
}

impl Category {
    /// Creates a validated category projection.
    pub fn new(
        id: CategoryId,
        name: impl Into<String>,
        active_dictionary_id: DictionaryId,
        default_centric_entity: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            active_dictionary_id,
            default_centric_entity: default_centric_entity
                .map(NonEmptyString::new)
                .transpose()?,
        })
    }

    /// Returns the category identifier.
    #[must_use]
    pub fn id(&self) -> CategoryId {
        self.id
    }

    /// Returns the unique category name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the currently active dictionary.
    #[must_use]
    pub fn active_dictionary_id(&self) -> DictionaryId {
        self.active_dictionary_id
    }

    /// Returns the entity compound views are centred on.
    #[must_use]
    pub fn default_centric_entity(&self) -> Option<&str> {
        self.default_centric_entity
            .as_ref()
            .map(NonEmptyString::as_str)
    }
}
