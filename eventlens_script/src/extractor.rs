//! Turn a parsed block tree into typed events.

use std::collections::BTreeMap;

use eventlens_data::{EventOption, ParsedEvent, ScriptValue, TriggerCondition};
use log::debug;

use crate::parser::Node;

/// Option children that describe the option rather than act as effects.
const OPTION_METADATA: [&str; 7] = ["id", "name", "title", "desc", "ai_chance", "trigger", "effect"];

/// Children with repeated-key arrays flattened into their elements.
fn expanded(children: &[Node]) -> impl Iterator<Item = &Node> {
    children.iter().flat_map(|child| match child {
        Node::Array { children, .. } => children.iter().collect::<Vec<_>>(),
        other => vec![other],
    })
}

fn group<'a>(nodes: impl Iterator<Item = &'a Node>) -> ScriptValue {
    let mut grouped: BTreeMap<String, Vec<ScriptValue>> = BTreeMap::new();
    for node in nodes {
        let Some(key) = node.key() else { continue };
        grouped.entry(key.to_string()).or_default().push(to_script_value(node));
    }
    if grouped.is_empty() {
        return ScriptValue::Null;
    }
    let map = grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                ScriptValue::List(values)
            };
            (key, value)
        })
        .collect();
    ScriptValue::Map(map)
}

/// Convert a node to a plain value. Repeated keys become lists, an empty
/// block becomes `Null`.
pub fn to_script_value(node: &Node) -> ScriptValue {
    match node {
        Node::Scalar { value, .. } => value.clone(),
        Node::Object { children, .. } => group(expanded(children)),
        Node::Array { children, .. } => ScriptValue::List(children.iter().map(to_script_value).collect()),
    }
}

/// Convert a node to a trigger condition.
///
/// `AND`/`OR`/`NOT` blocks are matched case-insensitively; anything else is a
/// leaf carrying its operator and value.
pub fn to_condition(node: &Node) -> TriggerCondition {
    if let Node::Array { children, .. } = node {
        return TriggerCondition::And(children.iter().map(to_condition).collect());
    }
    let key = node.key().unwrap_or_default();
    if matches!(node, Node::Object { .. }) {
        let mut children: Vec<TriggerCondition> = expanded(node.children()).map(to_condition).collect();
        match key.to_lowercase().as_str() {
            "and" => return TriggerCondition::And(children),
            "or" => return TriggerCondition::Or(children),
            "not" if children.len() == 1 => return TriggerCondition::Not(Box::new(children.remove(0))),
            "not" if !children.is_empty() => {
                return TriggerCondition::Not(Box::new(TriggerCondition::And(children)));
            },
            _ => {},
        }
    }
    TriggerCondition::Leaf {
        condition: key.to_string(),
        parameters: eventlens_data::ConditionParams {
            op: node.operator().to_string(),
            value: to_script_value(node),
        },
    }
}

/// A `trigger` block is the conjunction of its children. Empty gives `None`.
pub fn trigger_condition(node: &Node) -> Option<TriggerCondition> {
    let children: Vec<TriggerCondition> = expanded(node.children()).map(to_condition).collect();
    if children.is_empty() {
        None
    } else {
        Some(TriggerCondition::And(children))
    }
}

fn find_blocks<'a>(children: &'a [Node], key: &str) -> Vec<&'a Node> {
    expanded(children)
        .filter(|node| node.key().is_some_and(|k| k.eq_ignore_ascii_case(key)))
        .collect()
}

fn first_value(children: &[Node], key: &str) -> Option<ScriptValue> {
    find_blocks(children, key).first().map(|node| to_script_value(node))
}

fn first_text(children: &[Node], key: &str) -> Option<String> {
    match first_value(children, key)? {
        ScriptValue::Null => None,
        ScriptValue::Text(text) => Some(text),
        other if other.is_scalar() => Some(other.to_string()),
        _ => None,
    }
}

fn first_bool(children: &[Node], key: &str) -> Option<bool> {
    first_value(children, key)?.as_bool()
}

/// `ai_chance = 10` or `ai_chance = { factor = 10 ... }`.
fn ai_chance(children: &[Node]) -> Option<f64> {
    match first_value(children, "ai_chance")? {
        ScriptValue::Map(map) => map.get("factor").and_then(ScriptValue::as_number),
        other => other.as_number(),
    }
}

fn option_effects(children: &[Node]) -> Option<ScriptValue> {
    let explicit = find_blocks(children, "effect");
    let value = if explicit.is_empty() {
        group(expanded(children).filter(|node| {
            node.key()
                .is_some_and(|k| !OPTION_METADATA.iter().any(|meta| meta.eq_ignore_ascii_case(k)))
        }))
    } else {
        group(explicit.into_iter())
    };
    match value {
        ScriptValue::Null => None,
        value => Some(value),
    }
}

fn to_option(node: &Node) -> EventOption {
    let children = node.children();
    EventOption {
        id: first_text(children, "id"),
        name: first_text(children, "name"),
        title: first_text(children, "title"),
        desc: first_text(children, "desc"),
        ai_chance: ai_chance(children),
        trigger: find_blocks(children, "trigger").first().and_then(|t| trigger_condition(t)),
        effects: option_effects(children),
    }
}

/// Root keys that open an event block.
pub fn is_event_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.ends_with("_event") || key == "event"
}

fn to_event(node: &Node, namespace: Option<&str>) -> Option<ParsedEvent> {
    let children = node.children();
    let Some(id) = first_text(children, "id") else {
        debug!("skipping {} block without an id", node.key().unwrap_or_default());
        return None;
    };
    Some(ParsedEvent {
        namespace: namespace.map(str::to_string),
        id,
        title: first_text(children, "title"),
        desc: first_text(children, "desc"),
        picture: first_text(children, "picture"),
        trigger: find_blocks(children, "trigger").first().and_then(|t| trigger_condition(t)),
        immediate: find_blocks(children, "immediate")
            .first()
            .map(|block| to_script_value(block))
            .filter(|value| !value.is_null()),
        options: find_blocks(children, "option").into_iter().map(to_option).collect(),
        is_triggered_only: first_bool(children, "is_triggered_only"),
        fire_only_once: first_bool(children, "fire_only_once"),
        mean_time_to_happen: first_value(children, "mean_time_to_happen"),
        hidden: first_bool(children, "hidden"),
        major: first_bool(children, "major"),
    })
}

/// Collect every event block under the root.
pub fn extract(root: &Node) -> Vec<ParsedEvent> {
    let children = root.children();
    let namespace = first_text(children, "namespace");
    expanded(children)
        .filter(|node| matches!(node, Node::Object { .. }) && node.key().is_some_and(is_event_key))
        .filter_map(|node| to_event(node, namespace.as_deref()))
        .collect()
}
