use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::record::DataRecord;
use crate::schema_relations::{SchemaChildNode, SchemaRelationIndex};
use crate::submitted_data::SubmittedData;

/// Submitted data record with its dependent records nested by entity name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundRecord {
    /// Record system id.
    pub system_id: String,
    /// Record entity name.
    pub entity_name: String,
    /// Owning organization.
    pub organization: String,
    /// Whether the record passed its latest validation.
    pub is_valid: bool,
    /// Field values.
    pub data: DataRecord,
    /// Dependent records by child entity name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Vec<CompoundRecord>>,
}

/// Nests dependent rows under a record following the relation index.
///
/// A child row belongs to the record when every relation from its entity to the
/// record's entity matches. Rows already on the current path are not nested
/// again.
#[must_use]
pub fn build_compound_record(
    record: &SubmittedData,
    rows_by_entity: &BTreeMap<String, Vec<SubmittedData>>,
    index: &SchemaRelationIndex,
) -> CompoundRecord {
    let mut path = HashSet::new();
    build_nested(record, rows_by_entity, index, &mut path)
}

fn build_nested<'a>(
    record: &'a SubmittedData,
    rows_by_entity: &'a BTreeMap<String, Vec<SubmittedData>>,
    index: &SchemaRelationIndex,
    path: &mut HashSet<&'a str>,
) -> CompoundRecord {
    path.insert(record.system_id.as_str());

    let mut relations_by_child: BTreeMap<&str, Vec<&SchemaChildNode>> = BTreeMap::new();
    for relation in index.children_of(record.entity_name.as_str()) {
        relations_by_child
            .entry(relation.schema_name.as_str())
            .or_default()
            .push(relation);
    }

    let mut children = BTreeMap::new();
    for (child_entity, relations) in relations_by_child {
        let Some(rows) = rows_by_entity.get(child_entity) else {
            continue;
        };

        let mut nested = Vec::new();
        for row in rows {
            if path.contains(row.system_id.as_str()) || !references_parent(row, record, &relations) {
                continue;
            }
            nested.push(build_nested(row, rows_by_entity, index, path));
        }

        if !nested.is_empty() {
            children.insert(child_entity.to_owned(), nested);
        }
    }

    path.remove(record.system_id.as_str());

    CompoundRecord {
        system_id: record.system_id.clone(),
        entity_name: record.entity_name.clone(),
        organization: record.organization.clone(),
        is_valid: record.is_valid,
        data: record.data.clone(),
        children,
    }
}

fn references_parent(
    row: &SubmittedData,
    parent: &SubmittedData,
    relations: &[&SchemaChildNode],
) -> bool {
    relations.iter().all(|relation| {
        match (
            row.data.get(relation.field_name.as_str()),
            parent.data.get(relation.parent.field_name.as_str()),
        ) {
            (Some(child_value), Some(parent_value)) => child_value == parent_value,
            _ => false,
        }
    })
}
