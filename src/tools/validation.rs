//! Optional argument validation against a tool's JSON Schema.
//!
//! Checks the top level only: object shape, required fields, declared
//! property types and string enums. Deeper schema features are accepted
//! without inspection.

use serde_json::Value;

/// Validate `args` against `schema`, describing the first violation found.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    if schema.get("type").and_then(Value::as_str) == Some("object") && !args.is_object() {
        return Err(format!("expected object arguments, got {}", json_type_name(args)));
    }
    let Some(obj) = args.as_object() else {
        return Ok(());
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for name in required {
        if !obj.contains_key(name) {
            return Err(format!("missing required field '{name}'"));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in obj {
        let Some(prop) = properties.get(key) else {
            continue;
        };
        if let Some(expected) = prop.get("type").and_then(Value::as_str) {
            if !value_matches_type(value, expected) {
                return Err(format!(
                    "field '{key}' expected type '{expected}', got {}",
                    json_type_name(value)
                ));
            }
        }
        if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(format!("field '{key}' is not one of the allowed values"));
            }
        }
    }
    Ok(())
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolParameters;
    use serde_json::json;

    fn schema() -> Value {
        ToolParameters::object()
            .string("path", "File path", true)
            .integer("limit", "Max lines", false)
            .string_enum("mode", "Open mode", &["read", "write"], false)
            .build()
            .schema
    }

    #[test]
    fn accepts_well_formed_arguments() {
        assert!(validate_arguments(&json!({"path": "a.txt", "limit": 10}), &schema()).is_ok());
    }

    #[test]
    fn reports_missing_required_field() {
        let err = validate_arguments(&json!({"limit": 1}), &schema()).unwrap_err();
        assert_eq!(err, "missing required field 'path'");
    }

    #[test]
    fn reports_type_mismatch() {
        let err = validate_arguments(&json!({"path": "a", "limit": "ten"}), &schema()).unwrap_err();
        assert!(err.contains("'limit'"), "{err}");
    }

    #[test]
    fn rejects_values_outside_enum() {
        let err = validate_arguments(&json!({"path": "a", "mode": "append"}), &schema()).unwrap_err();
        assert!(err.contains("'mode'"), "{err}");
    }

    #[test]
    fn raw_string_arguments_fail_object_schema() {
        let err = validate_arguments(&json!("{broken"), &schema()).unwrap_err();
        assert_eq!(err, "expected object arguments, got string");
    }
}
