//! Typed event records produced by the script extractor.

use serde::{Deserialize, Serialize};

use crate::value::ScriptValue;

/// A boolean trigger tree gating an event or option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerCondition {
    And(Vec<TriggerCondition>),
    Or(Vec<TriggerCondition>),
    Not(Box<TriggerCondition>),
    Leaf {
        condition: String,
        parameters: ConditionParams,
    },
}

/// Operator and value attached to a leaf condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionParams {
    pub op: String,
    pub value: ScriptValue,
}

impl TriggerCondition {
    /// Build a leaf using the `=` operator.
    pub fn leaf(condition: impl Into<String>, value: impl Into<ScriptValue>) -> Self {
        Self::Leaf {
            condition: condition.into(),
            parameters: ConditionParams {
                op: "=".to_string(),
                value: value.into(),
            },
        }
    }

    /// Name of a leaf condition, `None` for composite nodes.
    pub fn condition_name(&self) -> Option<&str> {
        match self {
            Self::Leaf { condition, .. } => Some(condition),
            _ => None,
        }
    }
}

/// One selectable option of an event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Localization key for the option's label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<ScriptValue>,
}

/// An event block extracted from a script file.
///
/// Identity is `namespace.id`, compared case-insensitively; see [`ParsedEvent::qualified_id`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immediate: Option<ScriptValue>,
    #[serde(default)]
    pub options: Vec<EventOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_triggered_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_only_once: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_time_to_happen: Option<ScriptValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<bool>,
}

/// Namespace used for events declared before any `namespace = ...` line.
pub const DEFAULT_NAMESPACE: &str = "event";

impl ParsedEvent {
    /// Fully qualified `namespace.id` as written.
    ///
    /// Script files commonly spell ids already qualified (`id = flavor_tur.1`
    /// under `namespace = flavor_tur`); those are returned unchanged instead of
    /// being prefixed a second time.
    pub fn qualified_id(&self) -> String {
        let namespace = self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
        let prefix = format!("{}.", namespace.to_lowercase());
        if self.id.to_lowercase().starts_with(&prefix) {
            self.id.clone()
        } else {
            format!("{namespace}.{}", self.id)
        }
    }

    /// Lowercase identity used for index lookups.
    pub fn index_key(&self) -> String {
        self.qualified_id().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_id_prefixes_bare_ids() {
        let event = ParsedEvent {
            namespace: Some("flavor_eng".into()),
            id: "10".into(),
            ..ParsedEvent::default()
        };
        assert_eq!(event.qualified_id(), "flavor_eng.10");
    }

    #[test]
    fn qualified_id_keeps_already_qualified_ids() {
        let event = ParsedEvent {
            namespace: Some("flavor_tur".into()),
            id: "FLAVOR_TUR.1".into(),
            ..ParsedEvent::default()
        };
        assert_eq!(event.qualified_id(), "FLAVOR_TUR.1");
        assert_eq!(event.index_key(), "flavor_tur.1");
    }

    #[test]
    fn missing_namespace_uses_default() {
        let event = ParsedEvent {
            id: "7".into(),
            ..ParsedEvent::default()
        };
        assert_eq!(event.qualified_id(), "event.7");
    }
}
