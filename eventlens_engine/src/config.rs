//! Engine configuration.
//!
//! Settings come from built-in defaults, then an optional TOML file, then
//! environment variables. A file that cannot be read or parsed is reported
//! and ignored.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use eventlens_data::to_supported_language;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// File looked up in the working directory when no path is given.
pub const LOCAL_CONFIG_FILE: &str = "eventlens.toml";

/// Which configured events directory to read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Vanilla,
    Local,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vanilla => "vanilla",
            Self::Local => "local",
        }
    }

    /// `local` selects the local tree; anything else means vanilla.
    pub fn normalize(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("local") {
            Self::Local
        } else {
            Self::Vanilla
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vanilla" => Ok(Self::Vanilla),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown data source '{other}' (expected vanilla or local)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root for all cache subdirectories.
    pub cache_dir: PathBuf,
    pub cache_ttl_seconds: f64,
    pub cache_max_size_mb: f64,
    pub enable_async_parsing: bool,
    /// Worker threads for the parser pool; derived from the CPU count when unset.
    pub parser_worker_count: Option<usize>,
    pub vanilla_events_path: Option<PathBuf>,
    pub local_events_path: Option<PathBuf>,
    /// Directory scanned for `*_l_<language>.yml` files.
    pub localization_path: Option<PathBuf>,
    pub default_source: DataSource,
    pub default_language: String,
    pub fallback_language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache"),
            cache_ttl_seconds: 3600.0,
            cache_max_size_mb: 100.0,
            enable_async_parsing: true,
            parser_worker_count: None,
            vanilla_events_path: None,
            local_events_path: None,
            localization_path: None,
            default_source: DataSource::Vanilla,
            default_language: "english".to_string(),
            fallback_language: "english".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration for the running process.
    ///
    /// Looks at `explicit`, then `./eventlens.toml`, then
    /// `<config dir>/eventlens/config.toml`, and finally applies environment
    /// overrides. Never fails; problems are logged and defaults used.
    pub fn load(explicit: Option<&Path>) -> Self {
        let mut config = match Self::config_file(explicit) {
            Some(path) => match Self::from_toml_file(&path) {
                Ok(config) => {
                    info!("configuration loaded from '{}'", path.display());
                    config
                },
                Err(e) => {
                    warn!("could not load configuration from '{}': {e:#}. Using defaults.", path.display());
                    Self::default()
                },
            },
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    fn config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("eventlens").join("config.toml"))
            .filter(|path| path.is_file())
    }

    /// Parse a TOML config file. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration from '{}'", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing configuration from '{}'", path.display()))?;
        config.normalize_languages();
        Ok(config)
    }

    /// Apply `CACHE_DIR`-style overrides from `lookup`.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(dir) = var("CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = var("CACHE_TTL_SECONDS") {
            parse_into(&mut self.cache_ttl_seconds, "CACHE_TTL_SECONDS", &ttl);
        }
        if let Some(size) = var("CACHE_MAX_SIZE_MB") {
            parse_into(&mut self.cache_max_size_mb, "CACHE_MAX_SIZE_MB", &size);
        }
        if let Some(flag) = var("ENABLE_ASYNC_PARSING") {
            self.enable_async_parsing = flag != "false";
        }
        if let Some(count) = var("PARSER_WORKER_COUNT") {
            let mut parsed = 0usize;
            if parse_into(&mut parsed, "PARSER_WORKER_COUNT", &count) {
                self.parser_worker_count = Some(parsed);
            }
        }
        if let Some(path) = var("VANILLA_EVENTS_PATH") {
            self.vanilla_events_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var("LOCAL_EVENTS_PATH") {
            self.local_events_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var("LOCALIZATION_PATH") {
            self.localization_path = Some(PathBuf::from(path));
        }
        if let Some(source) = var("DEFAULT_SOURCE") {
            self.default_source = DataSource::normalize(&source);
        }
        if let Some(lang) = var("DEFAULT_LANGUAGE") {
            self.default_language = lang;
        }
        if let Some(lang) = var("FALLBACK_LANGUAGE") {
            self.fallback_language = lang;
        }
        self.normalize_languages();

        for path in [&self.vanilla_events_path, &self.local_events_path].into_iter().flatten() {
            if !path.exists() {
                warn!("game data path does not exist: {}", path.display());
            }
        }
    }

    fn normalize_languages(&mut self) {
        for (name, value) in [
            ("DEFAULT_LANGUAGE", &mut self.default_language),
            ("FALLBACK_LANGUAGE", &mut self.fallback_language),
        ] {
            match to_supported_language(value) {
                Some(lang) => *value = lang.to_string(),
                None => {
                    warn!("{name} '{value}' is not supported. Falling back to 'english'.");
                    *value = "english".to_string();
                },
            }
        }
    }

    /// Worker count for the parser pool (at least one).
    pub fn worker_count(&self) -> usize {
        self.parser_worker_count.map_or_else(default_worker_count, |n| n.max(1))
    }

    pub fn max_size_bytes(&self) -> u64 {
        (self.cache_max_size_mb.max(0.0) * 1024.0 * 1024.0) as u64
    }

    /// Default time-to-live for cache entries, `None` when non-positive.
    pub fn default_ttl_seconds(&self) -> Option<f64> {
        (self.cache_ttl_seconds > 0.0).then_some(self.cache_ttl_seconds)
    }

    pub fn cache_subdir(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }

    /// Events directory for `source`.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownSource`] when the source has no path.
    pub fn events_path(&self, source: DataSource) -> Result<&Path, EngineError> {
        let (path, variable) = match source {
            DataSource::Vanilla => (&self.vanilla_events_path, "VANILLA_EVENTS_PATH"),
            DataSource::Local => (&self.local_events_path, "LOCAL_EVENTS_PATH"),
        };
        path.as_deref().ok_or_else(|| EngineError::UnknownSource {
            source_name: source.as_str().to_string(),
            variable,
        })
    }
}

/// `clamp(available_parallelism - 1, 1, 4)`
pub fn default_worker_count() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    cpus.saturating_sub(1).clamp(1, 4)
}

fn parse_into<T: FromStr>(slot: &mut T, name: &str, raw: &str) -> bool {
    match raw.parse::<T>() {
        Ok(value) => {
            *slot = value;
            true
        },
        Err(_) => {
            warn!("ignoring {name}='{raw}': not a valid number");
            false
        },
    }
}
