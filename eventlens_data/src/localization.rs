//! Localization records and the decorated event returned by the resolver.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::event::{EventOption, ParsedEvent};

/// Languages the localization layer is configured for.
pub const SUPPORTED_LANGUAGES: [&str; 5] = ["english", "french", "german", "spanish", "russian"];

/// Normalize a language name, returning `None` if it is not supported.
pub fn to_supported_language(raw: &str) -> Option<&'static str> {
    let lower = raw.trim().to_lowercase();
    SUPPORTED_LANGUAGES.iter().copied().find(|lang| *lang == lower)
}

/// A single `key: "value"` line from a localization file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationEntry {
    pub key: String,
    pub value: String,
    pub language: String,
}

/// language -> (key -> value)
pub type LocalizationDictionary = HashMap<String, BTreeMap<String, String>>;

/// How a lookup should be performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_language: Option<String>,
    #[serde(default)]
    pub resolve_variables: bool,
}

impl ResolveOptions {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            fallback_language: None,
            resolve_variables: false,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, language: impl Into<String>) -> Self {
        self.fallback_language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_variables(mut self) -> Self {
        self.resolve_variables = true;
        self
    }
}

/// Resolved label for one option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_name: Option<String>,
    pub original_option: EventOption,
}

/// An event plus its resolved player-facing text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalizedEvent {
    #[serde(flatten)]
    pub event: ParsedEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_desc: Option<String>,
    #[serde(default)]
    pub localized_options: Vec<LocalizedOption>,
}
