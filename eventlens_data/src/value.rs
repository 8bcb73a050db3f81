//! Untyped script values.
//!
//! Anything nested under `immediate`, an option's effects, or an arbitrary
//! event field is kept as a [`ScriptValue`] tree. Repeated keys inside a block
//! have already been folded into a `List` by the time a value gets here.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use variantly::Variantly;

/// A scalar, list, or keyed mapping taken from a script block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Variantly)]
#[serde(untagged)]
pub enum ScriptValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ScriptValue>),
    Map(BTreeMap<String, ScriptValue>),
}

impl ScriptValue {
    /// True for the three leaf shapes (and `Null`).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Interpret the value the way script authors write switches.
    ///
    /// `yes`/`true`/`1` strings count as true; any non-zero number is true.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(text) => Some(matches!(text.as_str(), "yes" | "true" | "1")),
            Self::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    /// Every `Text` leaf in depth-first order; map values are visited by key.
    pub fn collect_strings(&self) -> Vec<&str> {
        match self {
            Self::Text(text) => vec![text.as_str()],
            Self::List(items) => items.iter().flat_map(ScriptValue::collect_strings).collect(),
            Self::Map(map) => map.values().flat_map(ScriptValue::collect_strings).collect(),
            _ => Vec::new(),
        }
    }

    /// Look up a field of a `Map` value.
    pub fn get(&self, key: &str) -> Option<&ScriptValue> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(true) => f.write_str("yes"),
            Self::Bool(false) => f.write_str("no"),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Text(text) => f.write_str(text),
            Self::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            },
            Self::Map(map) => {
                f.write_str("{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                f.write_str("}")
            },
        }
    }
}

/// Render a number without a trailing `.0` when it is integral.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for ScriptValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ScriptValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(ScriptValue::Number(10.0).to_string(), "10");
        assert_eq!(ScriptValue::Number(-42.0).to_string(), "-42");
        assert_eq!(ScriptValue::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn json_shape_is_plain() {
        let mut map = BTreeMap::new();
        map.insert("set_country_flag".to_string(), ScriptValue::from("eng_ready"));
        map.insert(
            "event".to_string(),
            ScriptValue::List(vec!["a.1".into(), ScriptValue::Number(2.0)]),
        );
        map.insert("hidden".to_string(), ScriptValue::Bool(true));
        map.insert("nothing".to_string(), ScriptValue::Null);
        let value = ScriptValue::Map(map);

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(
            json,
            r#"{"event":["a.1",2.0],"hidden":true,"nothing":null,"set_country_flag":"eng_ready"}"#
        );
        let back: ScriptValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn script_switches_read_as_bools() {
        assert_eq!(ScriptValue::from("yes").as_bool(), Some(true));
        assert_eq!(ScriptValue::from("no").as_bool(), Some(false));
        assert_eq!(ScriptValue::Number(0.0).as_bool(), Some(false));
        assert_eq!(ScriptValue::List(Vec::new()).as_bool(), None);
        assert!(ScriptValue::List(Vec::new()).is_list());
    }

    #[test]
    fn collect_strings_walks_nested_values() {
        let mut inner = BTreeMap::new();
        inner.insert("id".to_string(), ScriptValue::from("a.1"));
        inner.insert("days".to_string(), ScriptValue::Number(3.0));
        let value = ScriptValue::List(vec!["x".into(), ScriptValue::Map(inner), ScriptValue::Bool(true)]);
        assert_eq!(value.collect_strings(), vec!["x", "a.1"]);
    }
}
