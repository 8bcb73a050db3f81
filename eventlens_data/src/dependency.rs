use serde::{Deserialize, Serialize};

/// What kind of relationship a dependency records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Flag,
    Temporal,
    EventReference,
}

impl DependencyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Temporal => "temporal",
            Self::EventReference => "event_reference",
        }
    }
}

/// One flag, temporal gate, or event reference found in an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDependency {
    #[serde(rename = "type")]
    pub kind: DependencyType,
    pub key: String,
    pub source_event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_event_id: Option<String>,
    /// Locator into the originating trigger or effect tree, e.g. `trigger.and[1].or[0]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Condition or command name that produced the dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_missing: Option<bool>,
}

impl EventDependency {
    /// Composite key used to suppress duplicates inside one graph.
    pub fn dedup_key(&self) -> (DependencyType, String, String) {
        (
            self.kind,
            self.key.clone(),
            self.path.clone().unwrap_or_else(|| "root".to_string()),
        )
    }
}

/// All dependencies of a single event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventDependencyGraph {
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub dependencies: Vec<EventDependency>,
}

impl EventDependencyGraph {
    pub fn of_kind(&self, kind: DependencyType) -> impl Iterator<Item = &EventDependency> {
        self.dependencies.iter().filter(move |dep| dep.kind == kind)
    }
}
