//! Shared data model for EventLens.

pub mod country;
pub mod dependency;
pub mod event;
pub mod localization;
pub mod value;

pub use country::Country;
pub use dependency::{DependencyType, EventDependency, EventDependencyGraph};
pub use event::{ConditionParams, DEFAULT_NAMESPACE, EventOption, ParsedEvent, TriggerCondition};
pub use localization::{
    LocalizationDictionary, LocalizationEntry, LocalizedEvent, LocalizedOption, ResolveOptions,
    SUPPORTED_LANGUAGES, to_supported_language,
};
pub use value::ScriptValue;
