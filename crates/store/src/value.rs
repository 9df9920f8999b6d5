//! Typed leaf values

use serde_json::{Map, Number, Value};

/// A flattened configuration leaf
///
/// Objects never appear here; flattening turns them into dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    /// Integer that fits in an `i64`
    Integer(i64),
    /// Any other JSON number: floats and unsigned values above `i64::MAX`
    Number(Number),
    String(String),
    Array(Vec<Value>),
}

impl ConfigValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Integer(_) => "int64",
            ConfigValue::Number(_) => "number",
            ConfigValue::String(_) => "string",
            ConfigValue::Array(_) => "array",
        }
    }
}

impl TryFrom<Value> for ConfigValue {
    type Error = Map<String, Value>;

    /// Objects are handed back unchanged so the caller can flatten them.
    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Integer(i),
                None => ConfigValue::Number(n),
            },
            Value::String(s) => ConfigValue::String(s),
            Value::Array(items) => ConfigValue::Array(items),
            Value::Object(map) => return Err(map),
        })
    }
}

/// Types that can be read out of a [`ConfigValue`] by the typed accessors
pub trait FromConfigValue: Sized {
    /// Name used in type mismatch messages
    const TYPE_NAME: &'static str;

    fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromConfigValue for i64 {
    const TYPE_NAME: &'static str = "int64";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromConfigValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(value: Value) -> ConfigValue {
        ConfigValue::try_from(value).unwrap()
    }

    #[test]
    fn test_objects_are_not_leaves() {
        let err = ConfigValue::try_from(json!({"b": 1})).unwrap_err();
        assert_eq!(err.get("b"), Some(&json!(1)));
    }

    #[test]
    fn test_integer_classification() {
        assert_eq!(leaf(json!(5432)), ConfigValue::Integer(5432));
        assert_eq!(leaf(json!(-7)), ConfigValue::Integer(-7));
        assert!(matches!(leaf(json!(1.5)), ConfigValue::Number(_)));
        assert!(matches!(leaf(json!(5.0)), ConfigValue::Number(_)));
        assert!(matches!(
            leaf(json!(u64::MAX)),
            ConfigValue::Number(_)
        ));
    }

    #[test]
    fn test_typed_extraction() {
        let s = ConfigValue::String("db1".to_string());
        assert_eq!(String::from_config_value(&s), Some("db1".to_string()));
        assert_eq!(i64::from_config_value(&s), None);
        assert_eq!(bool::from_config_value(&s), None);

        assert_eq!(i64::from_config_value(&ConfigValue::Integer(3)), Some(3));
        assert_eq!(bool::from_config_value(&ConfigValue::Bool(false)), Some(false));
        assert_eq!(i64::from_config_value(&leaf(json!(2.5))), None);
    }

    #[test]
    fn test_strings_are_not_coerced() {
        assert_eq!(i64::from_config_value(&ConfigValue::String("5".into())), None);
        assert_eq!(
            bool::from_config_value(&ConfigValue::String("true".into())),
            None
        );
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ConfigValue::Null.type_name(), "null");
        assert_eq!(ConfigValue::Array(vec![]).type_name(), "array");
        assert_eq!(String::TYPE_NAME, "string");
        assert_eq!(i64::TYPE_NAME, "int64");
        assert_eq!(bool::TYPE_NAME, "bool");
    }
}
