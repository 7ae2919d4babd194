use serde_json::{Map, Value};

pub mod catalog;
pub mod remote;

pub use catalog::{CATALOG, ToolDef, build_tools};
pub use remote::RemoteTool;

/// Requires `args` to be an object carrying every key listed under the
/// schema's `required` array.
pub fn check_required_args(schema: &Value, args: Value) -> Result<Map<String, Value>, String> {
    let args = match args {
        Value::Object(args) => args,
        other => return Err(format!("arguments must be a JSON object, got {other}")),
    };

    let missing: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter(|key| args.get(*key).is_none_or(Value::is_null))
        .collect();

    if missing.is_empty() {
        Ok(args)
    } else {
        Err(format!("missing required argument(s): {}", missing.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_object_with_required_keys() {
        let schema = json!({"required": ["query"]});
        let args = check_required_args(&schema, json!({"query": "parks", "extra": 1})).unwrap();
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn reports_missing_and_null_keys() {
        let schema = json!({"required": ["origin", "destination"]});
        let err = check_required_args(&schema, json!({"origin": null})).unwrap_err();
        assert_eq!(err, "missing required argument(s): origin, destination");
    }

    #[test]
    fn schema_without_required_accepts_any_object() {
        assert!(check_required_args(&json!({}), json!({})).is_ok());
        assert!(check_required_args(&json!({}), json!("text")).is_err());
    }
}
