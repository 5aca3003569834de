use std::collections::HashSet;

use async_trait::async_trait;
use dictum_application::SchemaValidator;
use dictum_core::AppResult;
use dictum_domain::{
    DataRecord, EntityValidationDetail, InvalidRecord, RecordValidationError, SchemaDefinition,
    SchemaField, ValidationErrorReason, ValidationResult, canonical_value_key,
};
use serde_json::Value;

/// Validator enforcing dictionary field and unique-key restrictions in process.
///
/// Foreign keys are not checked here: the record set of one entity does not
/// carry the parent rows they refer to.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestrictionSchemaValidator;

#[async_trait]
impl SchemaValidator for RestrictionSchemaValidator {
    async fn validate(
        &self,
        entity_name: &str,
        records: &[DataRecord],
        schema: &SchemaDefinition,
    ) -> AppResult<ValidationResult> {
        let mut invalid_records = Vec::new();
        let mut seen_keys = HashSet::new();

        for (index, record) in records.iter().enumerate() {
            let mut record_errors: Vec<RecordValidationError> = schema
                .fields
                .iter()
                .filter_map(|field| field_error(field, index, record))
                .collect();
            if let Some(error) = unique_key_error(schema, index, record, &mut seen_keys) {
                record_errors.push(error);
            }

            if !record_errors.is_empty() {
                invalid_records.push(InvalidRecord {
                    record_index: index,
                    record_errors,
                });
            }
        }

        Ok(ValidationResult::failed(vec![EntityValidationDetail {
            schema_name: entity_name.to_owned(),
            invalid_records,
        }]))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn field_error(
    field: &SchemaField,
    index: usize,
    record: &DataRecord,
) -> Option<RecordValidationError> {
    let error = |reason, value: &Value, message: String| RecordValidationError {
        reason,
        field_name: field.name.clone(),
        field_value: value.clone(),
        index,
        message,
    };

    let missing = Value::Null;
    let value = match record.get(field.name.as_str()) {
        Some(value) if !is_blank(value) => value,
        value => {
            return field.restrictions.required.then(|| {
                error(
                    ValidationErrorReason::MissingRequiredField,
                    value.unwrap_or(&missing),
                    format!("'{}' is a required field", field.name),
                )
            });
        }
    };

    let items: Vec<&Value> = match (field.is_array, value) {
        (true, Value::Array(items)) => items.iter().collect(),
        (false, Value::Array(_)) | (true, _) => {
            let expected = if field.is_array { "an array" } else { "a single value" };
            return Some(error(
                ValidationErrorReason::InvalidValueType,
                value,
                format!("'{}' must be {expected}", field.name),
            ));
        }
        (false, scalar) => vec![scalar],
    };

    if let Some(item) = items.iter().find(|item| !field.value_type.accepts(item)) {
        return Some(error(
            ValidationErrorReason::InvalidValueType,
            item,
            format!(
                "'{}' must be of type {}",
                field.name,
                field.value_type.as_str()
            ),
        ));
    }

    let code_list = field.restrictions.code_list.as_ref()?;
    let allowed: HashSet<String> = code_list.iter().map(canonical_value_key).collect();
    items
        .into_iter()
        .find(|item| !allowed.contains(&canonical_value_key(item)))
        .map(|item| {
            error(
                ValidationErrorReason::InvalidByCodeList,
                item,
                format!("'{}' is not an accepted value for '{}'", item, field.name),
            )
        })
}

/// Flags a record repeating the unique key of an earlier record in the set.
fn unique_key_error(
    schema: &SchemaDefinition,
    index: usize,
    record: &DataRecord,
    seen_keys: &mut HashSet<String>,
) -> Option<RecordValidationError> {
    let unique_key = &schema.restrictions.unique_key;
    if unique_key.is_empty() {
        return None;
    }

    let values: Vec<&Value> = unique_key
        .iter()
        .map(|field_name| record.get(field_name.as_str()).filter(|value| !is_blank(value)))
        .collect::<Option<_>>()?;
    let key = values
        .iter()
        .map(|value| canonical_value_key(value))
        .collect::<Vec<_>>()
        .join("\u{1f}");
    if seen_keys.insert(key) {
        return None;
    }

    Some(RecordValidationError {
        reason: ValidationErrorReason::InvalidByUnique,
        field_name: unique_key.join(","),
        field_value: Value::Array(values.into_iter().cloned().collect()),
        index,
        message: format!("unique key ({}) is repeated", unique_key.join(", ")),
    })
}
