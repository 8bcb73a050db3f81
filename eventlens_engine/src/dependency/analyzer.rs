//! Dependency extraction from parsed events.
//!
//! Everything here is a pure function of an event and an [`EventIndex`].
//! Trigger trees yield flag, temporal, and event-reference dependencies;
//! `immediate` blocks and option effects yield flag commands and event calls.
//! Each dependency carries a dotted path such as `trigger.and[1].or[0]` or
//! `options[0].effects.country_event.id` naming where it was found.

use std::collections::{HashMap, HashSet};

use eventlens_data::{
    DependencyType, EventDependency, EventDependencyGraph, ParsedEvent, ScriptValue, TriggerCondition,
};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EVENT_ID_PATTERN: Regex = Regex::new(r"(?i)^[a-z_]+\.\d+$").expect("valid event id pattern");
    static ref FLAVOR_TAG_PATTERN: Regex = Regex::new(r"(?i)flavor_([a-z]{3})").expect("valid flavor pattern");
}

const TEMPORAL_CONDITIONS: [&str; 9] = [
    "years_passed",
    "months_passed",
    "days_passed",
    "year",
    "month",
    "day",
    "age",
    "date",
    "current_date",
];

const FLAG_COMMANDS: [&str; 4] = ["set_country_flag", "set_global_flag", "clr_country_flag", "clr_global_flag"];

const EVENT_CALL_COMMANDS: [&str; 4] = ["country_event", "province_event", "event", "character_event"];

/// Lookup of known events by lowercase `namespace.id`.
#[derive(Debug, Default)]
pub struct EventIndex<'a> {
    by_id: HashMap<String, &'a ParsedEvent>,
}

impl<'a> EventIndex<'a> {
    pub fn new(events: impl IntoIterator<Item = &'a ParsedEvent>) -> Self {
        Self {
            by_id: events.into_iter().map(|event| (event.index_key(), event)).collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(&id.to_lowercase())
    }

    pub fn get(&self, id: &str) -> Option<&'a ParsedEvent> {
        self.by_id.get(&id.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// `true` for strings shaped like `namespace.123`.
pub fn looks_like_event_id(value: &str) -> bool {
    EVENT_ID_PATTERN.is_match(value)
}

/// Country tag encoded in a `flavor_<tag>` namespace or id, uppercased.
pub fn tag_from_namespace(namespace: &str) -> Option<String> {
    FLAVOR_TAG_PATTERN
        .captures(namespace)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// A leaf of a trigger tree and where it sits.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedCondition<'a> {
    pub path: String,
    pub condition: &'a TriggerCondition,
}

/// A leaf selected by one of the trigger extractors, reduced to the string
/// that identifies the dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionHit {
    pub path: String,
    pub condition: String,
    pub value: String,
}

/// A flag command or event call found in an effect block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHit {
    pub path: String,
    pub command: String,
    pub value: String,
}

/// Depth-first leaves of a trigger tree. `And`/`Or` children append
/// `.and[i]`/`.or[i]`, `Not` appends `.not`.
pub fn flatten_conditions<'a>(condition: Option<&'a TriggerCondition>, path: &str) -> Vec<FlattenedCondition<'a>> {
    let mut out = Vec::new();
    if let Some(condition) = condition {
        flatten_into(condition, path.to_string(), &mut out);
    }
    out
}

fn flatten_into<'a>(condition: &'a TriggerCondition, path: String, out: &mut Vec<FlattenedCondition<'a>>) {
    match condition {
        TriggerCondition::And(children) => {
            for (idx, child) in children.iter().enumerate() {
                flatten_into(child, format!("{path}.and[{idx}]"), out);
            }
        },
        TriggerCondition::Or(children) => {
            for (idx, child) in children.iter().enumerate() {
                flatten_into(child, format!("{path}.or[{idx}]"), out);
            }
        },
        TriggerCondition::Not(inner) => flatten_into(inner, format!("{path}.not"), out),
        TriggerCondition::Leaf { .. } => out.push(FlattenedCondition { path, condition }),
    }
}

fn leaf_parts(condition: &TriggerCondition) -> Option<(&str, &ScriptValue)> {
    match condition {
        TriggerCondition::Leaf { condition, parameters } => Some((condition.as_str(), &parameters.value)),
        _ => None,
    }
}

/// Scalar display of a value, or `fallback` when there is nothing to show.
fn value_label(value: &ScriptValue, fallback: &str) -> String {
    match value {
        ScriptValue::Null => fallback.to_string(),
        other => other.to_string(),
    }
}

/// Leaves whose condition name mentions `flag`. A composite value yields
/// one hit per distinct string at that path.
pub fn extract_flags(condition: Option<&TriggerCondition>, base_path: &str) -> Vec<ConditionHit> {
    let mut hits = Vec::new();
    let mut seen = HashSet::new();
    for leaf in flatten_conditions(condition, base_path) {
        let Some((name, value)) = leaf_parts(leaf.condition) else { continue };
        if !name.to_lowercase().contains("flag") {
            continue;
        }
        let strings = value.collect_strings();
        let keys: Vec<String> = if strings.is_empty() {
            vec![value_label(value, name)]
        } else {
            strings.into_iter().map(str::to_string).collect()
        };
        for key in keys {
            if seen.insert((key.clone(), leaf.path.clone())) {
                hits.push(ConditionHit {
                    path: leaf.path.clone(),
                    condition: name.to_string(),
                    value: key,
                });
            }
        }
    }
    hits
}

/// Leaves gating on game time or age.
pub fn extract_temporal_conditions(condition: Option<&TriggerCondition>, base_path: &str) -> Vec<ConditionHit> {
    flatten_conditions(condition, base_path)
        .into_iter()
        .filter_map(|leaf| {
            let (name, value) = leaf_parts(leaf.condition)?;
            TEMPORAL_CONDITIONS
                .contains(&name.to_lowercase().as_str())
                .then(|| ConditionHit {
                    path: leaf.path,
                    condition: name.to_string(),
                    value: value_label(value, name),
                })
        })
        .collect()
}

/// Leaves that point at other events: an `*event*` condition whose first
/// string looks like an event id, otherwise any string that does.
pub fn extract_event_references(condition: Option<&TriggerCondition>, base_path: &str) -> Vec<ConditionHit> {
    let mut hits = Vec::new();
    let mut seen = HashSet::new();
    for leaf in flatten_conditions(condition, base_path) {
        let Some((name, value)) = leaf_parts(leaf.condition) else { continue };
        let strings = value.collect_strings();
        let named_target = name
            .to_lowercase()
            .contains("event")
            .then(|| strings.first().copied())
            .flatten()
            .filter(|first| looks_like_event_id(first));
        let targets: Vec<&str> = match named_target {
            Some(first) => vec![first],
            None => strings.into_iter().filter(|s| looks_like_event_id(s)).collect(),
        };
        for target in targets {
            if seen.insert((target.to_string(), leaf.path.clone())) {
                hits.push(ConditionHit {
                    path: leaf.path.clone(),
                    condition: name.to_string(),
                    value: target.to_string(),
                });
            }
        }
    }
    hits
}

/// Visit every map entry below `value` once, with its own key and path.
fn walk_entries<'v>(value: &'v ScriptValue, path: &str, visit: &mut impl FnMut(&str, &str, &'v ScriptValue)) {
    match value {
        ScriptValue::Map(map) => {
            for (key, child) in map {
                let child_path = format!("{path}.{key}");
                visit(&child_path, key, child);
                walk_entries(child, &child_path, visit);
            }
        },
        ScriptValue::List(items) => {
            for (idx, item) in items.iter().enumerate() {
                walk_entries(item, &format!("{path}[{idx}]"), visit);
            }
        },
        _ => {},
    }
}

/// `set_*_flag` / `clr_*_flag` commands, one hit per distinct flag string.
pub fn extract_flag_commands(value: Option<&ScriptValue>, base_path: &str) -> Vec<CommandHit> {
    let Some(value) = value else { return Vec::new() };
    let mut hits = Vec::new();
    let mut seen = HashSet::new();
    walk_entries(value, base_path, &mut |path, key, child| {
        if !FLAG_COMMANDS.contains(&key) {
            return;
        }
        for flag in child.collect_strings() {
            if seen.insert((path.to_string(), flag.to_string())) {
                hits.push(CommandHit {
                    path: path.to_string(),
                    command: key.to_string(),
                    value: flag.to_string(),
                });
            }
        }
    });
    hits
}

/// Event invocations such as `country_event = { id = x.1 }`.
///
/// A block with an `id` reports at `<path>.id`; a list reports each element
/// at `<path>[i]`; anything else uses its strings directly.
pub fn extract_event_calls(value: Option<&ScriptValue>, base_path: &str) -> Vec<CommandHit> {
    let Some(value) = value else { return Vec::new() };
    let mut hits = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |path: String, command: &str, target: &str| {
        if seen.insert((path.clone(), target.to_string())) {
            hits.push(CommandHit {
                path,
                command: command.to_string(),
                value: target.to_string(),
            });
        }
    };
    walk_entries(value, base_path, &mut |path, key, child| {
        if !EVENT_CALL_COMMANDS.contains(&key) {
            return;
        }
        let calls: Vec<(String, &ScriptValue)> = match child {
            ScriptValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| (format!("{path}[{idx}]"), item))
                .collect(),
            other => vec![(path.to_string(), other)],
        };
        for (call_path, call) in calls {
            match call.get("id") {
                Some(id) => {
                    for target in id.collect_strings() {
                        push(format!("{call_path}.id"), key, target);
                    }
                },
                None => {
                    for target in call.collect_strings() {
                        push(call_path.clone(), key, target);
                    }
                },
            }
        }
    });
    hits
}

struct GraphBuilder<'i, 'e> {
    event_id: String,
    index: &'i EventIndex<'e>,
    seen: HashSet<(DependencyType, String, String)>,
    dependencies: Vec<EventDependency>,
}

impl GraphBuilder<'_, '_> {
    fn push(&mut self, dependency: EventDependency) {
        if self.seen.insert(dependency.dedup_key()) {
            self.dependencies.push(dependency);
        }
    }

    fn dependency(&self, kind: DependencyType, key: String, path: String, details: String) -> EventDependency {
        let (target_event_id, is_missing) = if kind == DependencyType::EventReference {
            let missing = !self.index.contains(&key);
            (Some(key.clone()), Some(missing))
        } else {
            (None, None)
        };
        EventDependency {
            kind,
            key,
            source_event_id: self.event_id.clone(),
            target_event_id,
            path: Some(path),
            details: Some(details),
            is_missing,
        }
    }

    fn add_conditions(&mut self, hits: Vec<ConditionHit>, kind: DependencyType) {
        for hit in hits {
            let dep = self.dependency(kind, hit.value, hit.path, hit.condition);
            self.push(dep);
        }
    }

    fn add_commands(&mut self, hits: Vec<CommandHit>, kind: DependencyType) {
        for hit in hits {
            let dep = self.dependency(kind, hit.value, hit.path, hit.command);
            self.push(dep);
        }
    }

    fn add_trigger(&mut self, trigger: Option<&TriggerCondition>, base_path: &str) {
        self.add_conditions(extract_flags(trigger, base_path), DependencyType::Flag);
        self.add_conditions(extract_temporal_conditions(trigger, base_path), DependencyType::Temporal);
        self.add_conditions(extract_event_references(trigger, base_path), DependencyType::EventReference);
    }

    fn add_effects(&mut self, effects: Option<&ScriptValue>, base_path: &str) {
        self.add_commands(extract_flag_commands(effects, base_path), DependencyType::Flag);
        self.add_commands(extract_event_calls(effects, base_path), DependencyType::EventReference);
    }
}

/// Build the dependency graph of one event against the known-event index.
pub fn dependencies_for_event(event: &ParsedEvent, index: &EventIndex<'_>) -> EventDependencyGraph {
    let mut builder = GraphBuilder {
        event_id: event.qualified_id(),
        index,
        seen: HashSet::new(),
        dependencies: Vec::new(),
    };
    builder.add_trigger(event.trigger.as_ref(), "trigger");
    builder.add_effects(event.immediate.as_ref(), "immediate");
    for (idx, option) in event.options.iter().enumerate() {
        builder.add_trigger(option.trigger.as_ref(), &format!("options[{idx}].trigger"));
        builder.add_effects(option.effects.as_ref(), &format!("options[{idx}].effects"));
    }
    EventDependencyGraph {
        event_id: builder.event_id,
        namespace: event.namespace.clone(),
        dependencies: builder.dependencies,
    }
}

pub fn dependencies_for_events(events: &[ParsedEvent], index: &EventIndex<'_>) -> Vec<EventDependencyGraph> {
    events.iter().map(|event| dependencies_for_event(event, index)).collect()
}
