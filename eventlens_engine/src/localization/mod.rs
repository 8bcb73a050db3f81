//! Localization files and key resolution.

pub mod parser;
pub mod service;

use std::path::PathBuf;

pub use parser::parse_localization;
pub use service::{CYCLE_MARKER, LocalizationService, MISSING_MARKER};

/// Format problems in a localization file. Lines are 1-based.
#[derive(Debug, thiserror::Error)]
pub enum LocalizationError {
    #[error("missing localization header in {file}")]
    MissingHeader { file: String },
    #[error("entry before localization header in {file} at line {line}")]
    EntryBeforeHeader { file: String, line: usize },
    #[error("unsupported localization language '{language}' in {file} at line {line}")]
    UnsupportedLanguage { file: String, line: usize, language: String },
    #[error("header for '{found}' in {file} at line {line} conflicts with earlier '{expected}'")]
    ConflictingHeader {
        file: String,
        line: usize,
        expected: String,
        found: String,
    },
    #[error("invalid localization entry at line {line} in {file}: '{content}'")]
    InvalidEntry { file: String, line: usize, content: String },
    #[error("unable to read localization directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
