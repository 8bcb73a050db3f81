//! Two-tier (memory + JSON file) cache with expiry and size-bounded eviction.
//!
//! Each cache instance owns one directory holding one `<key>.json` file per
//! entry. Keys are sanitized to `[A-Za-z0-9-_:.]` before use, so the memory
//! map and the file stems always agree. Reads never fail: an unreadable,
//! corrupt, or expired file is removed and counted as a miss.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::EngineConfig;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O failed on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to serialize cache entry '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Lifetime requested for a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Ttl {
    /// The cache's configured default.
    #[default]
    Default,
    /// No time-based expiry; still subject to eviction.
    Never,
    Seconds(f64),
}

/// Stored form of a cached value. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub hits: u64,
    pub size: u64,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub total_size_bytes: u64,
    pub hit_rate: f64,
}

pub(crate) fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Map a key to its on-disk stem.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub struct CacheService<T> {
    dir: PathBuf,
    default_ttl_ms: Option<i64>,
    max_size_bytes: u64,
    memory: HashMap<String, CacheEntry<T>>,
    hits: u64,
    misses: u64,
}

impl<T> CacheService<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Create the directory if needed and load surviving entries from it.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>, default_ttl_seconds: Option<f64>, max_size_bytes: u64) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut cache = Self {
            dir,
            default_ttl_ms: default_ttl_seconds.map(|secs| (secs * 1000.0) as i64),
            max_size_bytes,
            memory: HashMap::new(),
            hits: 0,
            misses: 0,
        };
        cache.prune()?;
        Ok(cache)
    }

    /// Open `<cache_dir>/<name>` using the configured TTL and size cap.
    ///
    /// # Errors
    /// See [`CacheService::open`].
    pub fn from_config(config: &EngineConfig, name: &str) -> Result<Self, CacheError> {
        Self::open(config.cache_subdir(name), config.default_ttl_seconds(), config.max_size_bytes())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.json"))
    }

    fn remove_file(&self, stem: &str) -> Result<(), CacheError> {
        let path = self.file_path(stem);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    fn discard(&mut self, stem: &str) {
        self.memory.remove(stem);
        if let Err(e) = self.remove_file(stem) {
            warn!("{e}");
        }
    }

    fn read_from_disk(&self, stem: &str) -> Option<CacheEntry<T>> {
        let path = self.file_path(stem);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("unreadable cache file {}: {e}", path.display());
                return None;
            },
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("corrupt cache file {}: {e}", path.display());
                None
            },
        }
    }

    /// Look up `key`, promoting disk hits into memory.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let stem = sanitize_key(key);
        let now = now_ms();

        if let Some(entry) = self.memory.get_mut(&stem) {
            if !entry.is_expired(now) {
                entry.hits += 1;
                self.hits += 1;
                debug!("cache hit (memory) {key}");
                return Some(entry.value.clone());
            }
            self.discard(&stem);
            self.misses += 1;
            debug!("cache expired {key}");
            return None;
        }

        match self.read_from_disk(&stem) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.hits += 1;
                let value = entry.value.clone();
                self.memory.insert(stem, entry);
                self.hits += 1;
                debug!("cache hit (disk) {key}");
                Some(value)
            },
            _ => {
                self.discard(&stem);
                self.misses += 1;
                debug!("cache miss {key}");
                None
            },
        }
    }

    pub fn has(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Store `value` in memory and on disk, then evict if over capacity.
    ///
    /// # Errors
    /// Returns an error if the value cannot be serialized or written.
    pub fn set(&mut self, key: &str, value: T, ttl: Ttl) -> Result<(), CacheError> {
        let stem = sanitize_key(key);
        let size = serde_json::to_vec(&value)
            .map_err(|source| CacheError::Serialize {
                key: key.to_string(),
                source,
            })?
            .len() as u64;
        let now = now_ms();
        let ttl_ms = match ttl {
            Ttl::Default => self.default_ttl_ms,
            Ttl::Never => None,
            Ttl::Seconds(secs) => Some((secs * 1000.0) as i64),
        };
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: ttl_ms.map(|ms| now + ms),
            hits: 0,
            size,
        };
        let data = serde_json::to_string(&entry).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })?;
        let path = self.file_path(&stem);
        fs::write(&path, data).map_err(|source| CacheError::Io { path, source })?;
        self.memory.insert(stem, entry);
        self.enforce_capacity()
    }

    /// Remove `key` from both tiers. A missing file is not an error.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn delete(&mut self, key: &str) -> Result<(), CacheError> {
        let stem = sanitize_key(key);
        self.memory.remove(&stem);
        self.remove_file(&stem)
    }

    /// Drop every entry and every file in the cache directory.
    ///
    /// # Errors
    /// Propagates I/O failures other than a missing directory or file.
    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.memory.clear();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source,
                });
            },
        };
        for entry in entries {
            let path = entry
                .map_err(|source| CacheError::Io {
                    path: self.dir.clone(),
                    source,
                })?
                .path();
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {},
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(source) => return Err(CacheError::Io { path, source }),
            }
        }
        Ok(())
    }

    /// Load live entries from disk, delete expired or corrupt files, then
    /// enforce the size cap.
    ///
    /// # Errors
    /// Returns an error if eviction cannot remove a file.
    pub fn prune(&mut self) -> Result<(), CacheError> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Ok(());
        };
        let now = now_ms();
        let mut loaded = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            match self.read_from_disk(&stem) {
                Some(cached) if !cached.is_expired(now) => {
                    self.memory.insert(stem, cached);
                    loaded += 1;
                },
                _ => self.discard(&stem),
            }
        }
        if loaded > 0 {
            info!("{loaded} cache entries restored from '{}'", self.dir.display());
        }
        self.enforce_capacity()
    }

    fn current_size(&self) -> u64 {
        self.memory.values().map(|entry| entry.size).sum()
    }

    /// Evict least-hit, oldest entries until under `max_size_bytes`.
    fn enforce_capacity(&mut self) -> Result<(), CacheError> {
        let mut size = self.current_size();
        if size <= self.max_size_bytes {
            return Ok(());
        }
        let mut order: Vec<(u64, i64, String, u64)> = self
            .memory
            .iter()
            .map(|(stem, entry)| (entry.hits, entry.created_at, stem.clone(), entry.size))
            .collect();
        order.sort();
        for (_, _, stem, entry_size) in order {
            debug!("evicting cache entry {stem}");
            self.memory.remove(&stem);
            self.remove_file(&stem)?;
            size = size.saturating_sub(entry_size);
            if size <= self.max_size_bytes {
                break;
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            entries: self.memory.len(),
            total_size_bytes: self.current_size(),
            hit_rate: if total == 0 {
                0.0
            } else {
                self.hits as f64 / total as f64
            },
        }
    }
}
