//! Argument extraction for tool handlers.
//!
//! Tool arguments arrive as a JSON object. These helpers pull named fields
//! out with defaults and turn type mismatches into
//! [`R2rError::InvalidArgument`].

use serde_json::{Map, Value, json};

use crate::{R2rError, Result};

fn field<'a>(args: &'a Value, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|v| !v.is_null())
}

fn type_error(key: &str, expected: &str) -> R2rError {
    R2rError::InvalidArgument(format!("argument `{key}` must be {expected}"))
}

/// A required, non-empty string.
pub fn required_str(args: &Value, key: &str) -> Result<String> {
    match field(args, key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(R2rError::InvalidArgument(format!(
            "missing required argument `{key}`"
        ))),
        Some(_) => Err(type_error(key, "a string")),
    }
}

/// An optional string; empty strings count as absent.
pub fn optional_str(args: &Value, key: &str) -> Result<Option<String>> {
    match field(args, key) {
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        None => Ok(None),
        Some(_) => Err(type_error(key, "a string")),
    }
}

pub fn str_or(args: &Value, key: &str, default: &str) -> Result<String> {
    Ok(optional_str(args, key)?.unwrap_or_else(|| default.to_string()))
}

/// A non-negative integer, or `default` when absent.
pub fn u64_or(args: &Value, key: &str, default: u64) -> Result<u64> {
    match field(args, key) {
        None => Ok(default),
        Some(v) => v
            .as_u64()
            .ok_or_else(|| type_error(key, "a non-negative integer")),
    }
}

pub fn f64_or(args: &Value, key: &str, default: f64) -> Result<f64> {
    match field(args, key) {
        None => Ok(default),
        Some(v) => v.as_f64().ok_or_else(|| type_error(key, "a number")),
    }
}

/// An optional list of strings.
pub fn string_list(args: &Value, key: &str) -> Result<Option<Vec<String>>> {
    let Some(value) = field(args, key) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| type_error(key, "an array of strings"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| type_error(key, "an array of strings"))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

/// An identifier interpolated into an upstream path.
pub fn path_id(args: &Value, key: &str) -> Result<String> {
    let id = required_str(args, key)?;
    if id.contains(['/', '?', '#']) {
        return Err(R2rError::InvalidArgument(format!(
            "argument `{key}` is not a valid identifier: {id}"
        )));
    }
    Ok(id)
}

/// Build a JSON-schema object for a tool's input.
pub fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Schema for tools without arguments.
pub fn empty_schema() -> Value {
    object_schema(Value::Object(Map::new()), &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_str_rejects_missing_and_empty() {
        assert!(required_str(&json!({}), "query").is_err());
        assert!(required_str(&json!({"query": ""}), "query").is_err());
        assert!(required_str(&json!({"query": null}), "query").is_err());
        assert_eq!(required_str(&json!({"query": "x"}), "query").unwrap(), "x");
    }

    #[test]
    fn required_str_rejects_wrong_type() {
        let err = required_str(&json!({"query": 5}), "query").unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }

    #[test]
    fn numeric_defaults() {
        let args = json!({"limit": 5, "min_score": 0.5});
        assert_eq!(u64_or(&args, "limit", 10).unwrap(), 5);
        assert_eq!(u64_or(&args, "offset", 0).unwrap(), 0);
        assert_eq!(f64_or(&args, "min_score", 0.7).unwrap(), 0.5);
        assert!(u64_or(&json!({"limit": -1}), "limit", 10).is_err());
    }

    #[test]
    fn string_list_parses() {
        let args = json!({"ids": ["a", "b"]});
        assert_eq!(
            string_list(&args, "ids").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(string_list(&json!({}), "ids").unwrap(), None);
        assert!(string_list(&json!({"ids": [1]}), "ids").is_err());
    }

    #[test]
    fn path_id_rejects_separators() {
        assert!(path_id(&json!({"id": "abc/def"}), "id").is_err());
        assert_eq!(path_id(&json!({"id": "abc-123"}), "id").unwrap(), "abc-123");
    }
}
