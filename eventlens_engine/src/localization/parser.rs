//! Reader for `*_l_<language>.yml` localization files.
//!
//! ```text
//! l_english:
//!  flavor_eng.1.t:0 "The Crown"
//!  flavor_eng.1.d: "He said \"hi\""
//! ```

use eventlens_data::{LocalizationEntry, to_supported_language};
use lazy_static::lazy_static;
use regex::Regex;

use super::LocalizationError;

lazy_static! {
    static ref HEADER: Regex = Regex::new(r"(?i)^l_([a-z_]+):\s*$").expect("valid header pattern");
    static ref ENTRY: Regex = Regex::new(r#"^([^:#\s][^:]*?)\s*:\d*\s*"(.*)"\s*$"#).expect("valid entry pattern");
}

/// Parse the text of one localization file. `file` is only used in errors.
///
/// # Errors
/// See [`LocalizationError`]; the first offending line aborts the parse.
pub fn parse_localization(content: &str, file: &str) -> Result<Vec<LocalizationEntry>, LocalizationError> {
    let mut language: Option<&'static str> = None;
    let mut entries = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_start_matches('\u{feff}').trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(caps) = HEADER.captures(line) {
            let declared = &caps[1];
            let Some(found) = to_supported_language(declared) else {
                return Err(LocalizationError::UnsupportedLanguage {
                    file: file.to_string(),
                    line: line_no,
                    language: declared.to_lowercase(),
                });
            };
            match language {
                Some(current) if current != found => {
                    return Err(LocalizationError::ConflictingHeader {
                        file: file.to_string(),
                        line: line_no,
                        expected: current.to_string(),
                        found: found.to_string(),
                    });
                },
                _ => language = Some(found),
            }
            continue;
        }

        let Some(current) = language else {
            return Err(LocalizationError::EntryBeforeHeader {
                file: file.to_string(),
                line: line_no,
            });
        };
        let Some(caps) = ENTRY.captures(line) else {
            return Err(LocalizationError::InvalidEntry {
                file: file.to_string(),
                line: line_no,
                content: line.to_string(),
            });
        };
        entries.push(LocalizationEntry {
            key: caps[1].trim().to_string(),
            value: caps[2].replace("\\\"", "\""),
            language: current.to_string(),
        });
    }

    if language.is_none() {
        return Err(LocalizationError::MissingHeader { file: file.to_string() });
    }
    Ok(entries)
}
