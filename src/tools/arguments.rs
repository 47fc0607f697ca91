//! Typed access to tool call arguments.

use serde_json::Value;

use crate::error::StepwiseError;

/// Opaque tool call arguments with typed extraction helpers.
///
/// Arguments usually arrive as a JSON object. When a streamed call could not
/// be parsed, the raw text is kept as a JSON string instead.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    pub fn into_inner(self) -> Value {
        self.value
    }

    fn lookup<'a, T>(
        &'a self,
        key: &str,
        kind: &str,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, StepwiseError> {
        self.value
            .get(key)
            .and_then(extract)
            .ok_or_else(|| StepwiseError::InvalidArgument(format!("Missing {kind} argument: {key}")))
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, StepwiseError> {
        self.lookup(key, "string", Value::as_str)
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, StepwiseError> {
        self.lookup(key, "integer", Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, StepwiseError> {
        self.lookup(key, "number", Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, StepwiseError> {
        self.lookup(key, "boolean", Value::as_bool)
    }

    pub fn get_array(&self, key: &str) -> Result<&Vec<Value>, StepwiseError> {
        self.lookup(key, "array", Value::as_array)
    }

    /// Deserialize the arguments into a typed struct.
    ///
    /// A raw string payload is parsed as JSON first; an empty string counts
    /// as an empty object.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, StepwiseError> {
        let value = match &self.value {
            Value::String(raw) if raw.trim().is_empty() => Value::Object(Default::default()),
            Value::String(raw) => serde_json::from_str(raw.trim()).map_err(|e| {
                StepwiseError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
            })?,
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|e| {
            StepwiseError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

impl From<Value> for ToolArguments {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Query {
        city: String,
        days: u32,
    }

    #[test]
    fn typed_getters_report_missing_keys() {
        let args = ToolArguments::new(json!({"city": "Oslo", "days": 3, "metric": true}));
        assert_eq!(args.get_str("city").unwrap(), "Oslo");
        assert_eq!(args.get_i64("days").unwrap(), 3);
        assert!(args.get_bool("metric").unwrap());
        let err = args.get_str("country").unwrap_err();
        assert!(err.to_string().contains("country"));
    }

    #[test]
    fn deserialize_accepts_raw_json_strings() {
        let args = ToolArguments::new(json!(r#"{"city":"Lima","days":2}"#));
        let query: Query = args.deserialize().unwrap();
        assert_eq!(
            query,
            Query {
                city: "Lima".into(),
                days: 2
            }
        );
    }

    #[test]
    fn deserialize_rejects_garbage_strings() {
        let args = ToolArguments::new(json!("{not json"));
        assert!(matches!(
            args.deserialize::<Query>(),
            Err(StepwiseError::InvalidArgument(_))
        ));
    }
}
