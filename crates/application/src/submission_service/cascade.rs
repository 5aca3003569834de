use super::*;

impl SubmissionService {
    /// Rebuilds staged updates from their explicit edits plus the dependent
    /// updates those edits imply, recursively.
    ///
    /// Cascade-filled fields already staged are discarded first, so a replaced
    /// or reverted edit leaves no dependent update behind. Explicit values win
    /// over cascaded ones for the same field.
    pub(super) async fn resolve_update_cascade(
        &self,
        category_id: CategoryId,
        organization: &str,
        relations: &SchemaRelationIndex,
        staged: &BTreeMap<String, Vec<SubmissionUpdate>>,
    ) -> AppResult<BTreeMap<String, Vec<SubmissionUpdate>>> {
        let explicit = explicit_updates(staged);
        let mut resolved = explicit.clone();
        let mut queue: VecDeque<(String, SubmissionUpdate)> = explicit
            .into_iter()
            .flat_map(|(entity_name, updates)| {
                updates
                    .into_iter()
                    .map(move |update| (entity_name.clone(), update))
            })
            .collect();

        while let Some((entity_name, update)) = queue.pop_front() {
            let children = relations.children_of(entity_name.as_str());
            let affected = find_affected_relations(children, &update);
            if affected.is_empty() {
                continue;
            }

            let dependent_names: Vec<String> = affected
                .iter()
                .map(|relation| relation.entity_name.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let dependent_data = group_rows_by_entity(
                self.submitted_data_repository
                    .find_by_entities(category_id, Some(organization), &dependent_names)
                    .await?,
            );
            let new_values = dependent_new_values(children, &update);

            let instructions = build_dependent_update_instructions(DependentUpdateInput {
                dependent_data: &dependent_data,
                filter_entity: &affected,
                new_data_record: &new_values,
            });

            for (dependent_entity, dependent_updates) in instructions {
                for instruction in dependent_updates {
                    let entity_updates = resolved.entry(dependent_entity.clone()).or_default();
                    if let Some(applied) = combine_update(entity_updates, instruction) {
                        queue.push_back((dependent_entity.clone(), applied));
                    }
                }
            }
        }

        Ok(resolved)
    }

    /// Collects every committed record depending on the removed records, recursively.
    pub(super) async fn resolve_delete_cascade(
        &self,
        category_id: CategoryId,
        organization: &str,
        relations: &SchemaRelationIndex,
        removed: Vec<SubmittedData>,
    ) -> AppResult<BTreeMap<String, Vec<SubmittedData>>> {
        let mut visited: HashSet<String> =
            removed.iter().map(|row| row.system_id.clone()).collect();
        let mut resolved: BTreeMap<String, Vec<SubmittedData>> = BTreeMap::new();
        let mut queue: VecDeque<SubmittedData> = removed.into_iter().collect();

        while let Some(row) = queue.pop_front() {
            let filters = find_dependent_delete_filters(
                relations.children_of(row.entity_name.as_str()),
                &row.data,
            );
            resolved
                .entry(row.entity_name.clone())
                .or_default()
                .push(row);
            if filters.is_empty() {
                continue;
            }

            let dependent_names: Vec<String> = filters
                .iter()
                .map(|filter| filter.entity_name.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let candidates = self
                .submitted_data_repository
                .find_by_entities(category_id, Some(organization), &dependent_names)
                .await?;

            for candidate in candidates {
                if filters.iter().any(|filter| filter.matches(&candidate))
                    && visited.insert(candidate.system_id.clone())
                {
                    queue.push_back(candidate);
                }
            }
        }

        Ok(resolved)
    }
}

pub(super) fn group_rows_by_entity(
    rows: Vec<SubmittedData>,
) -> BTreeMap<String, Vec<SubmittedData>> {
    let mut grouped: BTreeMap<String, Vec<SubmittedData>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.entity_name.clone()).or_default().push(row);
    }

    grouped
}

/// Adds an instruction's fields that are not staged yet for its record.
///
/// Returns the part actually added, `None` when every field was already set.
/// Each field of a record is filled at most once, which bounds cyclic cascades.
fn combine_update(
    updates: &mut Vec<SubmissionUpdate>,
    instruction: SubmissionUpdate,
) -> Option<SubmissionUpdate> {
    let Some(existing) = updates
        .iter_mut()
        .find(|existing| existing.system_id == instruction.system_id)
    else {
        updates.push(instruction.clone());
        return Some(instruction);
    };

    let mut applied = SubmissionUpdate {
        system_id: instruction.system_id.clone(),
        ..SubmissionUpdate::default()
    };
    for field_name in &instruction.cascaded_fields {
        if existing.old.contains_key(field_name) || existing.new.contains_key(field_name) {
            continue;
        }

        if let Some(value) = instruction.old.get(field_name) {
            existing.old.insert(field_name.clone(), value.clone());
            applied.old.insert(field_name.clone(), value.clone());
        }
        if let Some(value) = instruction.new.get(field_name) {
            existing.new.insert(field_name.clone(), value.clone());
            applied.new.insert(field_name.clone(), value.clone());
        }
        existing.cascaded_fields.insert(field_name.clone());
        applied.cascaded_fields.insert(field_name.clone());
    }

    (!applied.cascaded_fields.is_empty()).then_some(applied)
}
