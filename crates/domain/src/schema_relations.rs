use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dictionary::SchemaDefinition;

/// Referenced side of a schema relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaParentNode {
    /// Parent entity name.
    pub schema_name: String,
    /// Parent field whose value children must carry.
    pub field_name: String,
}

/// Child entity field that must equal a parent entity field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaChildNode {
    /// Child entity name.
    pub schema_name: String,
    /// Child field holding the reference.
    pub field_name: String,
    /// Referenced parent field.
    pub parent: SchemaParentNode,
}

/// Read-only parent to child index over the foreign keys of a dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRelationIndex {
    children_by_parent: BTreeMap<String, Vec<SchemaChildNode>>,
}

impl SchemaRelationIndex {
    /// Derives the relation index from schema foreign keys.
    #[must_use]
    pub fn from_schemas(schemas: &[SchemaDefinition]) -> Self {
        let mut children_by_parent: BTreeMap<String, Vec<SchemaChildNode>> = BTreeMap::new();

        for schema in schemas {
            for foreign_key in &schema.restrictions.foreign_key {
                for mapping in &foreign_key.mappings {
                    children_by_parent
                        .entry(foreign_key.schema.clone())
                        .or_default()
                        .push(SchemaChildNode {
                            schema_name: schema.name.clone(),
                            field_name: mapping.local.clone(),
                            parent: SchemaParentNode {
                                schema_name: foreign_key.schema.clone(),
                                field_name: mapping.foreign.clone(),
                            },
                        });
                }
            }
        }

        Self { children_by_parent }
    }

    /// Builds an index from already derived relations.
    #[must_use]
    pub fn from_relations(relations: impl IntoIterator<Item = SchemaChildNode>) -> Self {
        let mut children_by_parent: BTreeMap<String, Vec<SchemaChildNode>> = BTreeMap::new();
        for relation in relations {
            children_by_parent
                .entry(relation.parent.schema_name.clone())
                .or_default()
                .push(relation);
        }

        Self { children_by_parent }
    }

    /// Returns relations whose parent is the given entity.
    #[must_use]
    pub fn children_of(&self, parent_schema_name: &str) -> &[SchemaChildNode] {
        self.children_by_parent
            .get(parent_schema_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates every relation in the index.
    pub fn relations(&self) -> impl Iterator<Item = &SchemaChildNode> {
        self.children_by_parent.values().flatten()
    }

    /// Returns whether the dictionary declares no relations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children_by_parent.is_empty()
    }
}
