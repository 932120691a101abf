//! Runtime value model.
//!
//! Parameter and variable values are typed but permissive: every value
//! coerces to every other shape with defined fallbacks, because runfile
//! authors write strings first and types second.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared data types for parameters and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Number,
    Boolean,
    List,
}

impl DataType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(DataType::String),
            "number" => Some(DataType::Number),
            "boolean" => Some(DataType::Boolean),
            "list" => Some(DataType::List),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::List => "list",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed runtime value with its raw source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub data_type: DataType,
    /// The text the value was built from.
    pub raw: String,
    typed: TypedValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TypedValue {
    Str(String),
    Number(f64),
    Boolean(bool),
    List(Vec<String>),
}

/// Accepted boolean spellings, shared with condition evaluation.
pub fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" | "enabled" => Some(true),
        "false" | "no" | "0" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Split a raw string into list items: an `[a, b]` literal when bracketed,
/// whitespace-separated words otherwise.
pub fn split_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        inner
            .split(',')
            .map(|item| item.trim().trim_matches('"').to_string())
            .filter(|item| !item.is_empty())
            .collect()
    } else {
        trimmed.split_whitespace().map(str::to_string).collect()
    }
}

impl Value {
    /// Build a value from raw text, coercing toward the declared type.
    /// Raw text that does not parse keeps the string representation; the
    /// validator reports the mismatch separately.
    pub fn from_raw(raw: impl Into<String>, data_type: DataType) -> Self {
        let raw = raw.into();
        let typed = match data_type {
            DataType::String => TypedValue::Str(raw.clone()),
            DataType::Number => match raw.trim().parse::<f64>() {
                Ok(n) => TypedValue::Number(n),
                Err(_) => TypedValue::Str(raw.clone()),
            },
            DataType::Boolean => match parse_boolean(&raw) {
                Some(b) => TypedValue::Boolean(b),
                None => TypedValue::Str(raw.clone()),
            },
            DataType::List => TypedValue::List(split_list(&raw)),
        };
        Self {
            data_type,
            raw,
            typed,
        }
    }

    pub fn string(raw: impl Into<String>) -> Self {
        Self::from_raw(raw, DataType::String)
    }

    pub fn list(items: Vec<String>) -> Self {
        let raw = items.join(" ");
        Self {
            data_type: DataType::List,
            raw,
            typed: TypedValue::List(items),
        }
    }

    /// True when the raw text parsed into the declared type.
    pub fn matches_declared_type(&self) -> bool {
        matches!(
            (&self.typed, self.data_type),
            (TypedValue::Str(_), DataType::String)
                | (TypedValue::Number(_), DataType::Number)
                | (TypedValue::Boolean(_), DataType::Boolean)
                | (TypedValue::List(_), DataType::List)
        )
    }

    pub fn as_string(&self) -> String {
        match &self.typed {
            TypedValue::Str(s) => s.clone(),
            TypedValue::Number(n) => format_number(*n),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::List(items) => items.join(" "),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &self.typed {
            TypedValue::Number(n) => Some(*n),
            TypedValue::Str(s) => s.trim().parse().ok(),
            TypedValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            TypedValue::List(_) => None,
        }
    }

    pub fn as_boolean(&self) -> bool {
        match &self.typed {
            TypedValue::Boolean(b) => *b,
            TypedValue::Number(n) => *n != 0.0,
            TypedValue::Str(s) => parse_boolean(s).unwrap_or(!s.trim().is_empty()),
            TypedValue::List(items) => !items.is_empty(),
        }
    }

    pub fn as_list(&self) -> Vec<String> {
        match &self.typed {
            TypedValue::List(items) => items.clone(),
            TypedValue::Str(s) => split_list(s),
            other => vec![match other {
                TypedValue::Number(n) => format_number(*n),
                TypedValue::Boolean(b) => b.to_string(),
                _ => unreachable!(),
            }],
        }
    }
}

/// Render a number without a trailing `.0` for whole values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_coercions() {
        let v = Value::from_raw("42", DataType::Number);
        assert!(v.matches_declared_type());
        assert_eq!(v.as_number(), Some(42.0));
        assert_eq!(v.as_string(), "42");
        assert!(v.as_boolean());

        let v = Value::from_raw("3.5", DataType::Number);
        assert_eq!(v.as_string(), "3.5");

        let bad = Value::from_raw("not-a-number", DataType::Number);
        assert!(!bad.matches_declared_type());
    }

    #[test]
    fn test_boolean_spellings() {
        for truthy in ["true", "yes", "1", "on", "enabled", "ON", "Yes"] {
            assert_eq!(parse_boolean(truthy), Some(true), "{truthy}");
        }
        for falsy in ["false", "no", "0", "off", "disabled"] {
            assert_eq!(parse_boolean(falsy), Some(false), "{falsy}");
        }
        assert_eq!(parse_boolean("maybe"), None);
    }

    #[test]
    fn test_list_parsing() {
        assert_eq!(split_list("[a, b, c]"), vec!["a", "b", "c"]);
        assert_eq!(split_list("[\"x\", \"y\"]"), vec!["x", "y"]);
        assert_eq!(split_list("one two three"), vec!["one", "two", "three"]);
        assert!(split_list("[]").is_empty());
    }

    #[test]
    fn test_list_value_round_trip() {
        let v = Value::from_raw("[a, b]", DataType::List);
        assert_eq!(v.as_list(), vec!["a", "b"]);
        assert_eq!(v.as_string(), "a b");
        assert!(v.as_boolean());
        assert!(Value::from_raw("[]", DataType::List).as_list().is_empty());
    }

    #[test]
    fn test_string_truthiness() {
        assert!(Value::string("anything").as_boolean());
        assert!(!Value::string("").as_boolean());
        assert!(!Value::string("false").as_boolean());
        assert!(!Value::string("off").as_boolean());
    }
}
