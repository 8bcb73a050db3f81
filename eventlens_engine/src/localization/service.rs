//! Per-language dictionaries and key resolution with fallback and `$var$` expansion.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use eventlens_data::{
    LocalizationDictionary, LocalizationEntry, LocalizedEvent, LocalizedOption, ParsedEvent, ResolveOptions,
};
use eventlens_script::read_script_file;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::{Captures, Regex};
use walkdir::WalkDir;

use super::LocalizationError;
use super::parser::parse_localization;
use crate::config::EngineConfig;
use crate::error::EngineResult;

pub const MISSING_MARKER: &str = "[MISSING]";
pub const CYCLE_MARKER: &str = "[CYCLE]";

lazy_static! {
    static ref VARIABLE: Regex = Regex::new(r"\$([^$]+)\$").expect("valid variable pattern");
    static ref LOCALIZATION_FILE: Regex = Regex::new(r"(?i)_l_[a-z]+\.yml$").expect("valid file pattern");
}

/// In-memory dictionaries plus the lookup rules over them.
///
/// Later loads overwrite earlier values for the same language and key.
#[derive(Debug, Clone)]
pub struct LocalizationService {
    dictionaries: LocalizationDictionary,
    default_language: String,
    fallback_language: String,
}

impl Default for LocalizationService {
    fn default() -> Self {
        Self::new("english", "english")
    }
}

impl LocalizationService {
    pub fn new(default_language: impl Into<String>, fallback_language: impl Into<String>) -> Self {
        Self {
            dictionaries: LocalizationDictionary::new(),
            default_language: default_language.into(),
            fallback_language: fallback_language.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.default_language.clone(), config.fallback_language.clone())
    }

    /// Languages with at least one loaded entry.
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.dictionaries.keys().cloned().collect();
        languages.sort();
        languages
    }

    /// Keys loaded for `language`, sorted.
    pub fn keys(&self, language: &str) -> Vec<String> {
        self.dictionaries
            .get(&language.to_lowercase())
            .map(|dict| dict.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Options for `language` using this service's configured fallback.
    pub fn options_for(&self, language: Option<&str>) -> ResolveOptions {
        ResolveOptions::new(language.unwrap_or(&self.default_language)).with_fallback(self.fallback_language.clone())
    }

    pub fn merge_entries(&mut self, entries: Vec<LocalizationEntry>) {
        for entry in entries {
            self.dictionaries
                .entry(entry.language)
                .or_insert_with(BTreeMap::new)
                .insert(entry.key, entry.value);
        }
    }

    /// Load one file and return how many entries it held.
    ///
    /// # Errors
    /// Fails if the file cannot be read or is malformed.
    pub fn load_file(&mut self, path: &Path) -> EngineResult<usize> {
        let content = read_script_file(path)?;
        let entries = parse_localization(&content, &path.display().to_string())?;
        let count = entries.len();
        self.merge_entries(entries);
        debug!("{count} localization entries from {}", path.display());
        Ok(count)
    }

    /// Load every `*_l_<lang>.yml` file below `dir`. Malformed files are
    /// skipped with a warning.
    ///
    /// # Errors
    /// Fails if `dir` is not a readable directory.
    pub fn load_directory(&mut self, dir: &Path) -> EngineResult<usize> {
        if let Err(source) = std::fs::read_dir(dir) {
            return Err(LocalizationError::Io {
                path: dir.to_path_buf(),
                source,
            }
            .into());
        }
        let mut count = 0;
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry under {}: {e}", dir.display());
                    continue;
                },
            };
            if !entry.file_type().is_file() || !LOCALIZATION_FILE.is_match(&entry.file_name().to_string_lossy()) {
                continue;
            }
            match self.load_file(entry.path()) {
                Ok(n) => count += n,
                Err(e) => warn!("skipping localization file {}: {e}", entry.path().display()),
            }
        }
        info!("loaded {count} localization entries from {}", dir.display());
        Ok(count)
    }

    /// Text for `key`, trying the requested language, then the fallback,
    /// then yielding `[MISSING] <key>`.
    pub fn resolve(&self, key: &str, options: &ResolveOptions) -> String {
        let language = options.language.to_lowercase();
        let fallback = self.fallback_for(options);
        self.lookup(key, &language, options, &mut HashSet::new())
            .or_else(|| self.lookup(key, &fallback, options, &mut HashSet::new()))
            .unwrap_or_else(|| format!("{MISSING_MARKER} {key}"))
    }

    /// Copy of `event` decorated with resolved title, description, and
    /// option names.
    pub fn resolve_event(&self, event: &ParsedEvent, options: &ResolveOptions) -> LocalizedEvent {
        let resolve = |key: Option<&str>| key.map(|key| self.resolve(key, options));
        LocalizedEvent {
            localized_title: resolve(event.title.as_deref()),
            localized_desc: resolve(event.desc.as_deref()),
            localized_options: event
                .options
                .iter()
                .map(|option| LocalizedOption {
                    id: option.id.clone(),
                    localized_name: resolve(option.name.as_deref().or(option.title.as_deref())),
                    original_option: option.clone(),
                })
                .collect(),
            event: event.clone(),
        }
    }

    fn fallback_for(&self, options: &ResolveOptions) -> String {
        options
            .fallback_language
            .as_deref()
            .unwrap_or(&self.fallback_language)
            .to_lowercase()
    }

    fn lookup(
        &self,
        key: &str,
        language: &str,
        options: &ResolveOptions,
        seen: &mut HashSet<String>,
    ) -> Option<String> {
        if !seen.insert(format!("{language}:{key}")) {
            return Some(format!("{CYCLE_MARKER} {key}"));
        }
        let raw = self.dictionaries.get(language)?.get(key)?;
        if !options.resolve_variables {
            return Some(raw.clone());
        }
        Some(self.expand(raw, language, options, seen))
    }

    /// Replace each `$var$` span; every branch gets its own copy of `seen`.
    fn expand(&self, value: &str, language: &str, options: &ResolveOptions, seen: &HashSet<String>) -> String {
        VARIABLE
            .replace_all(value, |caps: &Captures| {
                let var = &caps[1];
                self.lookup(var, language, options, &mut seen.clone())
                    .or_else(|| self.lookup(var, &self.fallback_for(options), options, &mut seen.clone()))
                    .unwrap_or_else(|| format!("{MISSING_MARKER} {var}"))
            })
            .into_owned()
    }
}
