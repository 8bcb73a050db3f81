//! Flag, temporal, and event-reference dependencies between events.

pub mod analyzer;
pub mod service;

pub use analyzer::{
    CommandHit, ConditionHit, EventIndex, FlattenedCondition, dependencies_for_event, dependencies_for_events,
    extract_event_calls, extract_event_references, extract_flag_commands, extract_flags, extract_temporal_conditions,
    flatten_conditions, looks_like_event_id, tag_from_namespace,
};
pub use service::{DependencyCacheStats, DependencyService, EventSource};
