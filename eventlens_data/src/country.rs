use serde::{Deserialize, Serialize};

/// A country that owns a flavor event file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Three-letter tag, e.g. `ENG`.
    pub tag: String,
    /// Localized display name.
    pub name: String,
    pub event_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}
