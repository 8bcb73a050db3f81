//! Cached parsing of event script files.

use std::path::{Path, PathBuf};
use std::thread;

use eventlens_data::ParsedEvent;
use eventlens_script::{DEFAULT_CHUNK_SIZE, extract, parse, read_script_file, read_script_file_chunked, tokenize_stream};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::cache::{CacheService, CacheStats, Ttl};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::pool::ParserPool;

/// Files at least this large go through the chunked reader.
pub const STREAMING_THRESHOLD_BYTES: u64 = 500_000;

pub const CACHE_NAME: &str = "events";

fn cache_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Every `.txt` file under `dir`, sorted by path.
pub fn script_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry under {}: {e}", dir.display());
                None
            },
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    files
}

pub struct EventParserService {
    cache: CacheService<Vec<ParsedEvent>>,
    pool: Option<ParserPool>,
    disposed: bool,
}

impl EventParserService {
    /// Open the parsed-file cache and, when enabled, start the worker pool.
    ///
    /// # Errors
    /// Returns an error if the cache directory cannot be prepared.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let cache = CacheService::from_config(config, CACHE_NAME)?;
        let pool = config
            .enable_async_parsing
            .then(|| ParserPool::new(config.worker_count()));
        Ok(Self::with_parts(cache, pool))
    }

    pub fn with_parts(cache: CacheService<Vec<ParsedEvent>>, pool: Option<ParserPool>) -> Self {
        Self {
            cache,
            pool,
            disposed: false,
        }
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.disposed {
            Err(EngineError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Parse one file on the calling thread, consulting the cache first.
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed, or after shutdown.
    pub fn parse_file(&mut self, path: &Path) -> EngineResult<Vec<ParsedEvent>> {
        self.ensure_running()?;
        let key = cache_key(path);
        if let Some(events) = self.cache.get(&key) {
            return Ok(events);
        }
        let events = eventlens_script::parse_events_file(path)?;
        self.cache.set(&key, events.clone(), Ttl::Default)?;
        Ok(events)
    }

    /// Like [`EventParserService::parse_file`] but the parse runs on the
    /// worker pool when one is configured.
    ///
    /// # Errors
    /// Same as [`EventParserService::parse_file`], plus worker failures.
    pub fn parse_file_pooled(&mut self, path: &Path) -> EngineResult<Vec<ParsedEvent>> {
        self.ensure_running()?;
        let Some(pool) = self.pool.as_ref() else {
            return self.parse_file(path);
        };
        let key = cache_key(path);
        if let Some(events) = self.cache.get(&key) {
            return Ok(events);
        }
        let content = read_script_file(path)?;
        let events = pool.parse(&content)?;
        self.cache.set(&key, events.clone(), Ttl::Default)?;
        Ok(events)
    }

    /// Parse every `.txt` file under `dir`.
    ///
    /// Files that fail to read or parse are skipped with a warning. Uncached
    /// files are handed to the pool in batches of the pool's size.
    ///
    /// # Errors
    /// Fails after shutdown or if the cache cannot be written.
    pub fn parse_directory(&mut self, dir: &Path) -> EngineResult<Vec<ParsedEvent>> {
        self.ensure_running()?;
        let files = script_files(dir);
        let mut results: Vec<Option<Vec<ParsedEvent>>> = vec![None; files.len()];
        let mut misses: Vec<(usize, String)> = Vec::new();

        for (idx, file) in files.iter().enumerate() {
            if let Some(events) = self.cache.get(&cache_key(file)) {
                results[idx] = Some(events);
                continue;
            }
            match read_script_file(file) {
                Ok(content) => misses.push((idx, content)),
                Err(e) => warn!("skipping {}: {e}", file.display()),
            }
        }
        debug!(
            "{}: {} cached, {} to parse",
            dir.display(),
            files.len() - misses.len(),
            misses.len()
        );

        let batch_size = self.pool.as_ref().map_or(1, ParserPool::live_workers).max(1);
        let pool = self.pool.as_ref();
        let mut parsed: Vec<(usize, EngineResult<Vec<ParsedEvent>>)> = Vec::with_capacity(misses.len());
        for batch in misses.chunks(batch_size) {
            match pool {
                Some(pool) => thread::scope(|scope| {
                    let running: Vec<_> = batch
                        .iter()
                        .map(|(idx, content)| (*idx, scope.spawn(move || pool.parse(content))))
                        .collect();
                    for (idx, handle) in running {
                        let outcome = handle.join().unwrap_or_else(|_| {
                            Err(EngineError::WorkerFailure {
                                worker: usize::MAX,
                                message: "dispatch thread panicked".to_string(),
                            })
                        });
                        parsed.push((idx, outcome));
                    }
                }),
                None => {
                    for (idx, content) in batch {
                        parsed.push((*idx, eventlens_script::parse_events(content).map_err(EngineError::from)));
                    }
                },
            }
        }

        for (idx, outcome) in parsed {
            match outcome {
                Ok(events) => {
                    self.cache.set(&cache_key(&files[idx]), events.clone(), Ttl::Default)?;
                    results[idx] = Some(events);
                },
                Err(e) => warn!("skipping {}: {e}", files[idx].display()),
            }
        }

        let events: Vec<ParsedEvent> = results.into_iter().flatten().flatten().collect();
        info!("{} events parsed from {} file(s) under '{}'", events.len(), files.len(), dir.display());
        Ok(events)
    }

    /// Parse a possibly very large file. Files under
    /// [`STREAMING_THRESHOLD_BYTES`] take the pooled path; larger ones are
    /// decoded chunk by chunk before tokenizing.
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed, or after shutdown.
    pub fn parse_file_streaming(&mut self, path: &Path) -> EngineResult<Vec<ParsedEvent>> {
        self.ensure_running()?;
        let size = std::fs::metadata(path)
            .map_err(|source| EngineError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size < STREAMING_THRESHOLD_BYTES {
            return self.parse_file_pooled(path);
        }
        debug!("streaming {} ({size} bytes)", path.display());
        let chunks = read_script_file_chunked(path, DEFAULT_CHUNK_SIZE)?.collect::<Result<Vec<_>, _>>()?;
        let events = match tokenize_stream(&chunks)? {
            Some(tokens) => extract(&parse(tokens)?),
            None => Vec::new(),
        };
        if !events.is_empty() {
            self.cache.set(&cache_key(path), events.clone(), Ttl::Default)?;
        }
        Ok(events)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// # Errors
    /// Propagates cache I/O failures.
    pub fn clear_cache(&mut self) -> EngineResult<()> {
        self.cache.clear().map_err(EngineError::from)
    }

    pub fn pool(&self) -> Option<&ParserPool> {
        self.pool.as_ref()
    }

    /// Stop the pool; later parse calls fail with [`EngineError::Shutdown`].
    pub fn shutdown(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn service(cache_dir: &Path, workers: Option<usize>) -> EventParserService {
        let cache = CacheService::open(cache_dir, Some(3600.0), 10 * 1024 * 1024).unwrap();
        EventParserService::with_parts(cache, workers.map(ParserPool::new))
    }

    fn write_events(dir: &Path, name: &str, namespace: &str, count: usize) -> PathBuf {
        let mut text = format!("namespace = {namespace}\n");
        for i in 1..=count {
            text.push_str(&format!("country_event = {{ id = {namespace}.{i} title = {namespace}.{i}.t }}\n"));
        }
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn parse_file_uses_cache_on_second_call() {
        let data = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let path = write_events(data.path(), "flavor_eng.txt", "flavor_eng", 2);
        let mut service = service(cache.path(), None);
        assert_eq!(service.parse_file(&path).unwrap().len(), 2);
        fs::write(&path, "garbage {").unwrap();
        assert_eq!(service.parse_file(&path).unwrap().len(), 2);
        assert!(service.cache_stats().hit_rate > 0.0);
    }

    #[test]
    fn streaming_a_missing_file_names_the_path() {
        let cache = TempDir::new().unwrap();
        let missing = cache.path().join("absent.txt");
        let err = service(cache.path(), Some(1)).parse_file_streaming(&missing).unwrap_err();
        match err {
            EngineError::Io { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn pooled_and_sync_agree() {
        let data = TempDir::new().unwrap();
        let path = write_events(data.path(), "flavor_fra.txt", "flavor_fra", 3);
        let sync_cache = TempDir::new().unwrap();
        let pooled_cache = TempDir::new().unwrap();
        let sync = service(sync_cache.path(), None).parse_file(&path).unwrap();
        let pooled = service(pooled_cache.path(), Some(2)).parse_file_pooled(&path).unwrap();
        assert_eq!(sync, pooled);
    }

    #[test]
    fn directory_parse_skips_broken_files() {
        let data = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write_events(data.path(), "a.txt", "flavor_aaa", 2);
        fs::create_dir(data.path().join("nested")).unwrap();
        write_events(&data.path().join("nested"), "b.txt", "flavor_bbb", 3);
        fs::write(data.path().join("broken.txt"), "country_event = { id = ").unwrap();
        fs::write(data.path().join("notes.md"), "ignored").unwrap();

        let mut service = service(cache.path(), Some(2));
        let events = service.parse_directory(data.path()).unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].qualified_id(), "flavor_aaa.1");
        assert_eq!(service.cache_stats().entries, 2);

        let again = service.parse_directory(data.path()).unwrap();
        assert_eq!(again, events);
    }

    #[test]
    fn streaming_large_file_matches_regular_parse() {
        let data = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let mut text = String::from("namespace = big\n");
        let mut i = 0;
        while text.len() < STREAMING_THRESHOLD_BYTES as usize + 1000 {
            i += 1;
            text.push_str(&format!(
                "country_event = {{\n\tid = big.{i}\n\ttitle = \"big.{i}.t\"\n\toption = {{ name = big.{i}.a }}\n}}\n"
            ));
        }
        let path = data.path().join("big.txt");
        fs::write(&path, &text).unwrap();

        let mut service = service(cache.path(), None);
        let streamed = service.parse_file_streaming(&path).unwrap();
        assert_eq!(streamed.len(), i);
        assert_eq!(streamed, eventlens_script::parse_events(&text).unwrap());
    }

    #[test]
    fn shutdown_rejects_further_parsing() {
        let data = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let path = write_events(data.path(), "x.txt", "flavor_xxx", 1);
        let mut service = service(cache.path(), Some(1));
        service.shutdown();
        assert!(matches!(service.parse_file(&path), Err(EngineError::Shutdown)));
        assert!(matches!(service.parse_directory(data.path()), Err(EngineError::Shutdown)));
    }

    #[test]
    fn missing_file_is_a_script_error() {
        let cache = TempDir::new().unwrap();
        let mut service = service(cache.path(), None);
        let err = service.parse_file(Path::new("/no/such/file.txt")).unwrap_err();
        assert!(matches!(err, EngineError::Script(eventlens_script::ScriptError::SourceIo { .. })));
    }
}
