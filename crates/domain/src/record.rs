use serde_json::{Map, Value};

/// Raw field to value mapping of one record, free of provenance metadata.
pub type DataRecord = Map<String, Value>;

/// Returns a canonical text key for a value: object keys sorted, recursively.
///
/// Two values produce the same key iff they are structurally equal.
#[must_use]
pub fn canonical_value_key(value: &Value) -> String {
    let mut output = String::new();
    write_canonical(value, &mut output);
    output
}

/// Returns a canonical text key for a record.
#[must_use]
pub fn canonical_record_key(record: &DataRecord) -> String {
    let mut output = String::new();
    write_canonical_object(record, &mut output);
    output
}

/// Returns whether two records hold structurally identical values.
#[must_use]
pub fn records_equal(left: &DataRecord, right: &DataRecord) -> bool {
    left.len() == right.len() && canonical_record_key(left) == canonical_record_key(right)
}

fn write_canonical(value: &Value, output: &mut String) {
    match value {
        Value::Array(items) => {
            output.push('[');
            for (position, item) in items.iter().enumerate() {
                if position > 0 {
                    output.push(',');
                }
                write_canonical(item, output);
            }
            output.push(']');
        }
        Value::Object(object) => write_canonical_object(object, output),
        scalar => output.push_str(scalar.to_string().as_str()),
    }
}

fn write_canonical_object(object: &Map<String, Value>, output: &mut String) {
    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();

    output.push('{');
    for (position, key) in keys.into_iter().enumerate() {
        if position > 0 {
            output.push(',');
        }
        output.push_str(Value::String(key.clone()).to_string().as_str());
        output.push(':');
        if let Some(value) = object.get(key) {
            write_canonical(value, output);
        }
    }
    output.push('}');
}
