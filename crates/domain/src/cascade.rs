use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::DataRecord;
use crate::schema_relations::SchemaChildNode;
use crate::submission::SubmissionUpdate;
use crate::submitted_data::SubmittedData;

/// Selector for dependent records referencing a changed or removed parent value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedRelation {
    /// Dependent entity name.
    pub entity_name: String,
    /// Dependent field holding the reference.
    pub data_field: String,
    /// Referenced value dependent rows currently carry.
    pub data_value: Value,
}

impl AffectedRelation {
    /// Returns whether a dependent row carries the referenced value.
    #[must_use]
    pub fn matches(&self, row: &SubmittedData) -> bool {
        row.entity_name == self.entity_name
            && row.data.get(self.data_field.as_str()) == Some(&self.data_value)
    }
}

/// Finds relations whose referenced parent field changes in the update.
///
/// A relation is affected only when its parent field is present on both sides
/// and the values differ; `1` and `"1"` count as different.
#[must_use]
pub fn find_affected_relations(
    relations: &[SchemaChildNode],
    update: &SubmissionUpdate,
) -> Vec<AffectedRelation> {
    relations
        .iter()
        .filter_map(|relation| {
            let parent_field = relation.parent.field_name.as_str();
            let old_value = update.old.get(parent_field)?;
            let new_value = update.new.get(parent_field)?;
            (old_value != new_value).then(|| AffectedRelation {
                entity_name: relation.schema_name.clone(),
                data_field: relation.field_name.clone(),
                data_value: old_value.clone(),
            })
        })
        .collect()
}

/// Maps each affected dependent entity and field to the parent's replacement value.
///
/// Values are keyed by dependent entity first, so two entities sharing a
/// field name while referencing different parent fields stay apart.
#[must_use]
pub fn dependent_new_values(
    relations: &[SchemaChildNode],
    update: &SubmissionUpdate,
) -> BTreeMap<String, DataRecord> {
    let mut values: BTreeMap<String, DataRecord> = BTreeMap::new();
    for relation in relations {
        let parent_field = relation.parent.field_name.as_str();
        if let (Some(old_value), Some(new_value)) =
            (update.old.get(parent_field), update.new.get(parent_field))
            && old_value != new_value
        {
            values
                .entry(relation.schema_name.clone())
                .or_default()
                .insert(relation.field_name.clone(), new_value.clone());
        }
    }

    values
}

/// Inputs for dependent update resolution.
#[derive(Debug, Clone, Copy)]
pub struct DependentUpdateInput<'a> {
    /// Candidate dependent rows by entity name.
    pub dependent_data: &'a BTreeMap<String, Vec<SubmittedData>>,
    /// Relations the parent update affects.
    pub filter_entity: &'a [AffectedRelation],
    /// Replacement values keyed by dependent entity, then dependent field.
    pub new_data_record: &'a BTreeMap<String, DataRecord>,
}

/// Emits field-level update instructions for dependent rows matching a filter.
///
/// Rows matching no filter are left alone. A row matched by several filters
/// receives one instruction covering every changed field. Every field an
/// instruction touches is recorded in its `cascaded_fields`.
#[must_use]
pub fn build_dependent_update_instructions(
    input: DependentUpdateInput<'_>,
) -> BTreeMap<String, Vec<SubmissionUpdate>> {
    let mut instructions: BTreeMap<String, Vec<SubmissionUpdate>> = BTreeMap::new();

    for filter in input.filter_entity {
        let Some(rows) = input.dependent_data.get(filter.entity_name.as_str()) else {
            continue;
        };

        for row in rows.iter().filter(|row| filter.matches(row)) {
            let entity_instructions = instructions.entry(filter.entity_name.clone()).or_default();
            let position = match entity_instructions
                .iter()
                .position(|instruction| instruction.system_id == row.system_id)
            {
                Some(position) => position,
                None => {
                    entity_instructions.push(SubmissionUpdate {
                        system_id: row.system_id.clone(),
                        old: DataRecord::new(),
                        new: DataRecord::new(),
                        cascaded_fields: BTreeSet::new(),
                    });
                    entity_instructions.len() - 1
                }
            };

            let instruction = &mut entity_instructions[position];
            instruction
                .old
                .insert(filter.data_field.clone(), filter.data_value.clone());
            instruction.cascaded_fields.insert(filter.data_field.clone());
            if let Some(new_value) = input
                .new_data_record
                .get(filter.entity_name.as_str())
                .and_then(|values| values.get(filter.data_field.as_str()))
            {
                instruction
                    .new
                    .insert(filter.data_field.clone(), new_value.clone());
            }
        }
    }

    instructions
}

/// Strips cascade-filled fields from staged updates, keeping only edits.
///
/// Updates and entities left without an explicit change are dropped.
#[must_use]
pub fn explicit_updates(
    updates: &BTreeMap<String, Vec<SubmissionUpdate>>,
) -> BTreeMap<String, Vec<SubmissionUpdate>> {
    updates
        .iter()
        .filter_map(|(entity_name, entity_updates)| {
            let explicit: Vec<SubmissionUpdate> = entity_updates
                .iter()
                .filter_map(SubmissionUpdate::explicit_part)
                .collect();
            (!explicit.is_empty()).then(|| (entity_name.clone(), explicit))
        })
        .collect()
}

/// Finds dependents that reference a record being deleted.
#[must_use]
pub fn find_dependent_delete_filters(
    relations: &[SchemaChildNode],
    record: &DataRecord,
) -> Vec<AffectedRelation> {
    relations
        .iter()
        .filter_map(|relation| {
            record
                .get(relation.parent.field_name.as_str())
                .map(|value| AffectedRelation {
                    entity_name: relation.schema_name.clone(),
                    data_field: relation.field_name.clone(),
                    data_value: value.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use dictum_core::{CategoryId, DictionaryId};
    use serde_json::{Value, json};

    use super::{
        AffectedRelation, DependentUpdateInput, build_dependent_update_instructions,
        dependent_new_values, explicit_updates, find_affected_relations,
        find_dependent_delete_filters,
    };
    use crate::record::DataRecord;
    use crate::schema_relations::{SchemaChildNode, SchemaParentNode};
    use crate::submission::SubmissionUpdate;
    use crate::submitted_data::SubmittedData;

    fn record(value: Value) -> DataRecord {
        match value {
            Value::Object(object) => object,
            _ => unreachable!(),
        }
    }

    fn relation(child: &str, child_field: &str, parent: &str, parent_field: &str) -> SchemaChildNode {
        SchemaChildNode {
            schema_name: child.to_owned(),
            field_name: child_field.to_owned(),
            parent: SchemaParentNode {
                schema_name: parent.to_owned(),
                field_name: parent_field.to_owned(),
            },
        }
    }

    fn row(system_id: &str, entity_name: &str, data: Value) -> SubmittedData {
        SubmittedData {
            id: 1,
            system_id: system_id.to_owned(),
            category_id: CategoryId::new(1),
            entity_name: entity_name.to_owned(),
            organization: "org".to_owned(),
            data: record(data),
            is_valid: true,
            original_schema_id: DictionaryId::new(1),
            last_valid_schema_id: Some(DictionaryId::new(1)),
            created_by: "tester".to_owned(),
            updated_by: None,
        }
    }

    #[test]
    fn changed_identifier_yields_dependent_filter() {
        let relations = vec![relation("employee", "personId", "person", "personId")];
        let update = SubmissionUpdate {
            system_id: "SYS1".to_owned(),
            old: record(json!({"personId": "RRRRR001"})),
            new: record(json!({"personId": "PPPPP001"})),
            ..SubmissionUpdate::default()
        };

        let affected = find_affected_relations(&relations, &update);

        assert_eq!(
            affected,
            vec![AffectedRelation {
                entity_name: "employee".to_owned(),
                data_field: "personId".to_owned(),
                data_value: json!("RRRRR001"),
            }]
        );
    }

    #[test]
    fn unchanged_or_one_sided_fields_are_not_affected() {
        let relations = vec![
            relation("employee", "personId", "person", "personId"),
            relation("badge", "ownerName", "person", "name"),
        ];
        let update = SubmissionUpdate {
            system_id: "SYS1".to_owned(),
            old: record(json!({"personId": "P1"})),
            new: record(json!({"personId": "P1", "name": "Ann"})),
            ..SubmissionUpdate::default()
        };

        assert!(find_affected_relations(&relations, &update).is_empty());
    }

    #[test]
    fn numeric_and_string_values_are_not_conflated() {
        let relations = vec![relation("employee", "personId", "person", "personId")];
        let update = SubmissionUpdate {
            system_id: "SYS1".to_owned(),
            old: record(json!({"personId": 1})),
            new: record(json!({"personId": "1"})),
            ..SubmissionUpdate::default()
        };

        assert_eq!(find_affected_relations(&relations, &update).len(), 1);
    }

    #[test]
    fn only_matching_dependents_receive_instructions() {
        let relations = vec![relation("employee", "personId", "person", "personId")];
        let update = SubmissionUpdate {
            system_id: "SYS1".to_owned(),
            old: record(json!({"personId": "RRRRR001"})),
            new: record(json!({"personId": "PPPPP001"})),
            ..SubmissionUpdate::default()
        };
        let affected = find_affected_relations(&relations, &update);
        let new_values = dependent_new_values(&relations, &update);
        let dependent_data = BTreeMap::from([(
            "employee".to_owned(),
            vec![
                row("EMP1", "employee", json!({"employeeId": "E1", "personId": "RRRRR001"})),
                row("EMP2", "employee", json!({"employeeId": "E2", "personId": "OTHER"})),
            ],
        )]);

        let instructions = build_dependent_update_instructions(DependentUpdateInput {
            dependent_data: &dependent_data,
            filter_entity: &affected,
            new_data_record: &new_values,
        });

        assert_eq!(
            instructions,
            BTreeMap::from([(
                "employee".to_owned(),
                vec![SubmissionUpdate {
                    system_id: "EMP1".to_owned(),
                    old: record(json!({"personId": "RRRRR001"})),
                    new: record(json!({"personId": "PPPPP001"})),
                    cascaded_fields: BTreeSet::from(["personId".to_owned()]),
                }]
            )])
        );
    }

    #[test]
    fn delete_filters_use_parent_values() {
        let relations = vec![relation("employee", "personId", "person", "personId")];
        let filters =
            find_dependent_delete_filters(&relations, &record(json!({"personId": "P9"})));

        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].data_value, json!("P9"));
        assert!(find_dependent_delete_filters(&relations, &record(json!({}))).is_empty());
    }

    #[test]
    fn shared_dependent_field_names_keep_their_own_parent_values() {
        let relations = vec![
            relation("account", "ref", "person", "personId"),
            relation("badge", "ref", "person", "badgeCode"),
        ];
        let update = SubmissionUpdate {
            system_id: "SYS1".to_owned(),
            old: record(json!({"personId": "P1", "badgeCode": "B1"})),
            new: record(json!({"personId": "P2", "badgeCode": "B2"})),
            ..SubmissionUpdate::default()
        };
        let affected = find_affected_relations(&relations, &update);
        let new_values = dependent_new_values(&relations, &update);
        let dependent_data = BTreeMap::from([
            (
                "account".to_owned(),
                vec![row("ACC1", "account", json!({"ref": "P1"}))],
            ),
            (
                "badge".to_owned(),
                vec![row("BDG1", "badge", json!({"ref": "B1"}))],
            ),
        ]);

        let instructions = build_dependent_update_instructions(DependentUpdateInput {
            dependent_data: &dependent_data,
            filter_entity: &affected,
            new_data_record: &new_values,
        });

        assert_eq!(instructions["account"][0].new, record(json!({"ref": "P2"})));
        assert_eq!(instructions["badge"][0].new, record(json!({"ref": "B2"})));
    }

    #[test]
    fn explicit_updates_drop_cascade_only_entries() {
        let updates = BTreeMap::from([
            (
                "employee".to_owned(),
                vec![SubmissionUpdate {
                    system_id: "EMP1".to_owned(),
                    old: record(json!({"personId": "RRRRR001"})),
                    new: record(json!({"personId": "PPPPP001"})),
                    cascaded_fields: BTreeSet::from(["personId".to_owned()]),
                }],
            ),
            (
                "person".to_owned(),
                vec![SubmissionUpdate {
                    system_id: "SYS1".to_owned(),
                    old: record(json!({"personId": "RRRRR001"})),
                    new: record(json!({"personId": "PPPPP001"})),
                    ..SubmissionUpdate::default()
                }],
            ),
        ]);

        let explicit = explicit_updates(&updates);

        assert_eq!(explicit.len(), 1);
        assert_eq!(explicit["person"][0].system_id, "SYS1");
    }
}
