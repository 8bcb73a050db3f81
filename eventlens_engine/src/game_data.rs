//! Country-level view over the events and localization directories.

use std::fs;
use std::path::{Path, PathBuf};

use eventlens_data::{Country, LocalizedEvent, ParsedEvent, ResolveOptions};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::cache::{CacheService, CacheStats, Ttl};
use crate::config::{DataSource, EngineConfig};
use crate::dependency::{EventSource, tag_from_namespace};
use crate::error::{EngineError, EngineResult};
use crate::event_parser::EventParserService;
use crate::localization::LocalizationService;

lazy_static! {
    static ref COUNTRY_FILE: Regex = Regex::new(r"(?i)^flavor_([a-z]{3})\.txt$").expect("valid country file pattern");
}

pub const EVENTS_BY_COUNTRY_CACHE_NAME: &str = "events-by-country";
pub const COUNTRIES_CACHE_NAME: &str = "countries";
pub const ALL_EVENTS_CACHE_NAME: &str = "events-all";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GameDataCacheStats {
    pub events_by_country: CacheStats,
    pub countries: CacheStats,
    pub all_events: CacheStats,
    pub parsed_files: CacheStats,
}

pub struct GameDataService {
    config: EngineConfig,
    parser: EventParserService,
    localization: LocalizationService,
    events_cache: CacheService<Vec<ParsedEvent>>,
    countries_cache: CacheService<Vec<Country>>,
    all_events_cache: CacheService<Vec<ParsedEvent>>,
}

fn namespace_prefix(tag: &str) -> String {
    format!("flavor_{}", tag.to_lowercase())
}

/// `flavor_<tag>.txt` in `events_path`, matching the file name case-insensitively.
fn country_file(events_path: &Path, tag: &str) -> PathBuf {
    let wanted = format!("{}.txt", namespace_prefix(tag));
    fs::read_dir(events_path)
        .into_iter()
        .flatten()
        .flatten()
        .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(&wanted))
        .map_or_else(|| events_path.join(&wanted), |entry| entry.path())
}

impl GameDataService {
    /// Build every service from `config`, loading localization from
    /// `localization_path` when it is set.
    ///
    /// # Errors
    /// Returns an error if a cache directory cannot be prepared.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let parser = EventParserService::new(&config)?;
        let mut localization = LocalizationService::from_config(&config);
        if let Some(dir) = config.localization_path.as_deref()
            && let Err(e) = localization.load_directory(dir)
        {
            warn!("localization not loaded: {e}");
        }
        Self::with_services(config, parser, localization)
    }

    /// # Errors
    /// Returns an error if a cache directory cannot be prepared.
    pub fn with_services(
        config: EngineConfig,
        parser: EventParserService,
        localization: LocalizationService,
    ) -> EngineResult<Self> {
        Ok(Self {
            events_cache: CacheService::from_config(&config, EVENTS_BY_COUNTRY_CACHE_NAME)?,
            countries_cache: CacheService::from_config(&config, COUNTRIES_CACHE_NAME)?,
            all_events_cache: CacheService::from_config(&config, ALL_EVENTS_CACHE_NAME)?,
            config,
            parser,
            localization,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn localization(&self) -> &LocalizationService {
        &self.localization
    }

    pub fn localization_mut(&mut self) -> &mut LocalizationService {
        &mut self.localization
    }

    pub fn parser_mut(&mut self) -> &mut EventParserService {
        &mut self.parser
    }

    /// Countries with a `flavor_<tag>.txt` file directly in the source's
    /// events directory, sorted by tag.
    ///
    /// # Errors
    /// Fails if the source has no configured directory or it cannot be listed.
    pub fn discover_countries(&mut self, source: DataSource) -> EngineResult<Vec<Country>> {
        if let Some(countries) = self.countries_cache.get(source.as_str()) {
            return Ok(countries);
        }
        let events_path = self.config.events_path(source)?.to_path_buf();
        let listing = fs::read_dir(&events_path).map_err(|source| EngineError::Io {
            path: events_path.clone(),
            source,
        })?;

        let names = self.localization.options_for(None).with_variables();
        let mut countries = Vec::new();
        for entry in listing.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(caps) = COUNTRY_FILE.captures(&file_name) else { continue };
            let tag = caps[1].to_uppercase();
            let event_count = match self.parse_country_events(&events_path, &tag) {
                Ok(events) => events.len(),
                Err(e) => {
                    warn!("could not parse events for {tag}: {e}");
                    0
                },
            };
            countries.push(Country {
                name: self.localization.resolve(&format!("{tag}_name"), &names),
                event_count,
                namespace: Some(namespace_prefix(&tag)),
                tag,
            });
        }
        countries.sort_by(|a, b| a.tag.cmp(&b.tag));
        info!("{} countries discovered in {source} data", countries.len());
        self.countries_cache
            .set(source.as_str(), countries.clone(), Ttl::Never)?;
        Ok(countries)
    }

    fn parse_country_events(&mut self, events_path: &Path, tag: &str) -> EngineResult<Vec<ParsedEvent>> {
        let prefix = namespace_prefix(tag);
        let file = country_file(events_path, tag);
        let events = self.parser.parse_file_pooled(&file)?;
        Ok(events
            .into_iter()
            .filter(|event| {
                event
                    .namespace
                    .as_deref()
                    .is_some_and(|ns| ns.to_lowercase().starts_with(&prefix))
            })
            .collect())
    }

    /// Events from `flavor_<tag>.txt` whose namespace starts with `flavor_<tag>`.
    ///
    /// # Errors
    /// Fails if the file is missing or cannot be parsed.
    pub fn events_by_country(&mut self, tag: &str, source: DataSource) -> EngineResult<Vec<ParsedEvent>> {
        let tag = tag.to_uppercase();
        let key = format!("{source}:{tag}");
        if let Some(events) = self.events_cache.get(&key) {
            return Ok(events);
        }
        let events_path = self.config.events_path(source)?.to_path_buf();
        let events = self.parse_country_events(&events_path, &tag)?;
        debug!("{} events for {tag} in {source}", events.len());
        self.events_cache.set(&key, events.clone(), Ttl::Never)?;
        Ok(events)
    }

    /// Every event under the source's events directory.
    ///
    /// # Errors
    /// Fails if the source has no configured directory.
    pub fn all_events(&mut self, source: DataSource) -> EngineResult<Vec<ParsedEvent>> {
        if let Some(events) = self.all_events_cache.get(source.as_str()) {
            return Ok(events);
        }
        let events_path = self.config.events_path(source)?.to_path_buf();
        let events = self.parser.parse_directory(&events_path)?;
        self.all_events_cache
            .set(source.as_str(), events.clone(), Ttl::Never)?;
        Ok(events)
    }

    /// Case-insensitive lookup of `namespace.id`. Country events are found
    /// through their country file, anything else through the full listing.
    ///
    /// # Errors
    /// Propagates parse failures of the files consulted.
    pub fn event_by_id(&mut self, event_id: &str, source: DataSource) -> EngineResult<Option<ParsedEvent>> {
        let candidates = match tag_from_namespace(event_id) {
            Some(tag) => self.events_by_country(&tag, source)?,
            None => self.all_events(source)?,
        };
        Ok(candidates
            .into_iter()
            .find(|event| event.qualified_id().eq_ignore_ascii_case(event_id)))
    }

    /// Country events with resolved text. Variables are always expanded;
    /// unset languages use the configured defaults.
    ///
    /// # Errors
    /// See [`GameDataService::events_by_country`].
    pub fn localized_events_by_country(
        &mut self,
        tag: &str,
        source: DataSource,
        language: Option<&str>,
        fallback_language: Option<&str>,
    ) -> EngineResult<Vec<LocalizedEvent>> {
        let events = self.events_by_country(tag, source)?;
        let mut options: ResolveOptions = self.localization.options_for(language).with_variables();
        if let Some(fallback) = fallback_language {
            options = options.with_fallback(fallback);
        }
        Ok(events
            .iter()
            .map(|event| self.localization.resolve_event(event, &options))
            .collect())
    }

    /// Drop cached countries, event lists, and parsed files.
    ///
    /// # Errors
    /// Fails if a cache file cannot be removed.
    pub fn clear_cache(&mut self) -> EngineResult<()> {
        self.events_cache.clear()?;
        self.countries_cache.clear()?;
        self.all_events_cache.clear()?;
        self.parser.clear_cache()
    }

    pub fn cache_stats(&self) -> GameDataCacheStats {
        GameDataCacheStats {
            events_by_country: self.events_cache.stats(),
            countries: self.countries_cache.stats(),
            all_events: self.all_events_cache.stats(),
            parsed_files: self.parser.cache_stats(),
        }
    }

    pub fn shutdown(&mut self) {
        self.parser.shutdown();
    }
}

impl EventSource for GameDataService {
    fn events_by_country(&mut self, tag: &str, source: DataSource) -> EngineResult<Vec<ParsedEvent>> {
        GameDataService::events_by_country(self, tag, source)
    }

    fn all_events(&mut self, source: DataSource) -> EngineResult<Vec<ParsedEvent>> {
        GameDataService::all_events(self, source)
    }

    fn event_by_id(&mut self, id: &str, source: DataSource) -> EngineResult<Option<ParsedEvent>> {
        GameDataService::event_by_id(self, id, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GameDataService) {
        let root = TempDir::new().unwrap();
        let events = root.path().join("events");
        let loc = root.path().join("localisation");
        fs::create_dir_all(&events).unwrap();
        fs::create_dir_all(&loc).unwrap();
        fs::write(
            events.join("flavor_eng.txt"),
            "namespace = flavor_eng\ncountry_event = { id = flavor_eng.1 title = flavor_eng.1.t }\n\
             country_event = { id = flavor_eng.2 }\n",
        )
        .unwrap();
        fs::write(
            events.join("Flavor_FRA.txt"),
            "namespace = fra_misc\ncountry_event = { id = fra_misc.1 }\n",
        )
        .unwrap();
        fs::write(events.join("religion.txt"), "namespace = religion\ncountry_event = { id = religion.3 }\n").unwrap();
        fs::write(
            loc.join("countries_l_english.yml"),
            "l_english:\n ENG_name: \"England\"\n flavor_eng.1.t: \"The Crown\"\n",
        )
        .unwrap();

        let config = EngineConfig {
            cache_dir: root.path().join("cache"),
            enable_async_parsing: false,
            vanilla_events_path: Some(events),
            localization_path: Some(loc),
            ..EngineConfig::default()
        };
        let service = GameDataService::new(config).unwrap();
        (root, service)
    }

    #[test]
    fn countries_are_discovered_and_named() {
        let (_root, mut data) = setup();
        let countries = data.discover_countries(DataSource::Vanilla).unwrap();
        let tags: Vec<&str> = countries.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["ENG", "FRA"]);
        assert_eq!(countries[0].name, "England");
        assert_eq!(countries[0].event_count, 2);
        // The file exists but none of its events sit under `flavor_fra`.
        assert_eq!(countries[1].name, "[MISSING] FRA_name");
        assert_eq!(countries[1].event_count, 0);
        assert!(matches!(
            data.discover_countries(DataSource::Local),
            Err(EngineError::UnknownSource { .. })
        ));
    }

    #[test]
    fn country_events_filter_by_namespace() {
        let (_root, mut data) = setup();
        let events = data.events_by_country("eng", DataSource::Vanilla).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].qualified_id(), "flavor_eng.1");
        assert_eq!(data.cache_stats().events_by_country.entries, 1);
    }

    #[test]
    fn lookup_by_id_covers_country_and_other_events() {
        let (_root, mut data) = setup();
        assert!(data.event_by_id("FLAVOR_ENG.1", DataSource::Vanilla).unwrap().is_some());
        assert!(data.event_by_id("religion.3", DataSource::Vanilla).unwrap().is_some());
        assert!(data.event_by_id("religion.4", DataSource::Vanilla).unwrap().is_none());
        assert_eq!(data.all_events(DataSource::Vanilla).unwrap().len(), 4);
    }

    #[test]
    fn localized_events_resolve_titles() {
        let (_root, mut data) = setup();
        let localized = data
            .localized_events_by_country("ENG", DataSource::Vanilla, Some("french"), None)
            .unwrap();
        assert_eq!(localized[0].localized_title.as_deref(), Some("The Crown"));
        data.clear_cache().unwrap();
        assert_eq!(data.cache_stats().events_by_country.entries, 0);
    }
}
