//! Recursive flattening of nested JSON objects
//!
//! Configs may nest values:
//!
//! ```json
//! { "app": { "name": "myApp", "size": 10 } }
//! ```
//!
//! which flatten to `app.name = "myApp"` and `app.size = 10`.

use crate::ConfigValue;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Separator placed between path segments
pub const PATH_SEPARATOR: char = '.';

/// Flatten a JSON object into a dotted-path map
///
/// Arrays are leaves and are stored whole. Empty nested objects produce no
/// entries. When two spellings produce the same path, keys are visited in
/// ascending byte order at every level and the later write wins. A key is
/// always visited before any longer key it prefixes, so `{"a.b": 1}` beats
/// `{"a": {"b": 2}}` no matter how the document orders them.
pub fn flatten(object: Map<String, Value>) -> HashMap<String, ConfigValue> {
    let mut flat = HashMap::new();
    flatten_into(&mut flat, "", object);
    flat
}

fn flatten_into(flat: &mut HashMap<String, ConfigValue>, prefix: &str, object: Map<String, Value>) {
    let mut entries: Vec<(String, Value)> = object.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (key, value) in entries {
        let path = format!("{prefix}{key}");

        match ConfigValue::try_from(value) {
            Ok(leaf) => {
                flat.insert(path, leaf);
            }
            Err(nested) => {
                let nested_prefix = format!("{path}{PATH_SEPARATOR}");
                flatten_into(flat, &nested_prefix, nested);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_flatten_nested() {
        let flat = flatten(object(json!({
            "database": {
                "host": "db1",
                "port": 5432,
                "ssl": true,
                "pool": { "max": 10 }
            },
            "name": "svc"
        })));

        assert_eq!(flat.len(), 5);
        assert_eq!(
            flat.get("database.host"),
            Some(&ConfigValue::String("db1".to_string()))
        );
        assert_eq!(flat.get("database.port"), Some(&ConfigValue::Integer(5432)));
        assert_eq!(flat.get("database.ssl"), Some(&ConfigValue::Bool(true)));
        assert_eq!(flat.get("database.pool.max"), Some(&ConfigValue::Integer(10)));
        assert_eq!(flat.get("name"), Some(&ConfigValue::String("svc".to_string())));
        assert!(!flat.contains_key("database"));
    }

    #[test]
    fn test_nested_and_dotted_spellings_match() {
        let nested = flatten(object(json!({"a": {"b": 1}})));
        let dotted = flatten(object(json!({"a.b": 1})));

        assert_eq!(nested, dotted);
        assert_eq!(nested.get("a.b"), Some(&ConfigValue::Integer(1)));
    }

    #[test]
    fn test_arrays_are_leaves() {
        let flat = flatten(object(json!({"hosts": ["a", "b"], "matrix": [{"x": 1}]})));

        assert_eq!(
            flat.get("hosts"),
            Some(&ConfigValue::Array(vec![json!("a"), json!("b")]))
        );
        assert!(flat.contains_key("matrix"));
        assert!(!flat.contains_key("matrix.x"));
        assert!(!flat.contains_key("hosts.0"));
    }

    #[test]
    fn test_null_and_empty_object() {
        let flat = flatten(object(json!({"optional": null, "empty": {}})));

        assert_eq!(flat.get("optional"), Some(&ConfigValue::Null));
        assert!(!flat.contains_key("empty"));
        assert_eq!(flat.len(), 1);
    }

    #[test]
    fn test_dotted_key_wins_collision() {
        let first: Map<String, Value> =
            serde_json::from_str(r#"{"a.b": 1, "a": {"b": 2}}"#).unwrap();
        let second: Map<String, Value> =
            serde_json::from_str(r#"{"a": {"b": 2}, "a.b": 1}"#).unwrap();

        assert_eq!(flatten(first).get("a.b"), Some(&ConfigValue::Integer(1)));
        assert_eq!(flatten(second).get("a.b"), Some(&ConfigValue::Integer(1)));
    }

    #[test]
    fn test_collision_inside_nested_object() {
        let flat = flatten(object(json!({
            "x": { "y": { "z": "nested" }, "y.z": "dotted" }
        })));

        assert_eq!(
            flat.get("x.y.z"),
            Some(&ConfigValue::String("dotted".to_string()))
        );
        assert_eq!(flat.len(), 1);
    }
}
