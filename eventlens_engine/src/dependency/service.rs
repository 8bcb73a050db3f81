//! Cached dependency graphs per country and per event.

use eventlens_data::{EventDependencyGraph, ParsedEvent};
use log::{debug, info};
use serde::Serialize;

use super::analyzer::{EventIndex, dependencies_for_event, dependencies_for_events, tag_from_namespace};
use crate::cache::{CacheService, CacheStats, Ttl};
use crate::config::{DataSource, EngineConfig};
use crate::error::EngineResult;

pub const COUNTRY_CACHE_NAME: &str = "deps-country";
pub const EVENT_CACHE_NAME: &str = "deps-event";

/// Where the dependency service gets its events from.
pub trait EventSource {
    /// Events of one country, by uppercase tag.
    fn events_by_country(&mut self, tag: &str, source: DataSource) -> EngineResult<Vec<ParsedEvent>>;

    /// Every event known for `source`; used to resolve references.
    fn all_events(&mut self, source: DataSource) -> EngineResult<Vec<ParsedEvent>>;

    /// Case-insensitive lookup by `namespace.id`.
    fn event_by_id(&mut self, id: &str, source: DataSource) -> EngineResult<Option<ParsedEvent>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DependencyCacheStats {
    pub country: CacheStats,
    pub event: CacheStats,
}

/// Caches dependency graphs per country and per event. Entries never expire
/// by time; [`DependencyService::clear_cache`] drops them.
pub struct DependencyService {
    country_cache: CacheService<Vec<EventDependencyGraph>>,
    event_cache: CacheService<EventDependencyGraph>,
}

fn event_key(source: DataSource, event_id: &str) -> String {
    format!("{source}:{}", event_id.to_lowercase())
}

impl DependencyService {
    /// # Errors
    /// Returns an error if either cache directory cannot be prepared.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        Ok(Self::with_caches(
            CacheService::from_config(config, COUNTRY_CACHE_NAME)?,
            CacheService::from_config(config, EVENT_CACHE_NAME)?,
        ))
    }

    pub fn with_caches(
        country_cache: CacheService<Vec<EventDependencyGraph>>,
        event_cache: CacheService<EventDependencyGraph>,
    ) -> Self {
        Self {
            country_cache,
            event_cache,
        }
    }

    /// Graphs for `events`, resolving references against `all_events`.
    pub fn dependencies_for_country_events(
        &self,
        events: &[ParsedEvent],
        all_events: &[ParsedEvent],
    ) -> Vec<EventDependencyGraph> {
        let index = EventIndex::new(all_events);
        dependencies_for_events(events, &index)
    }

    /// Graphs for every event of country `tag`.
    ///
    /// # Errors
    /// Propagates failures from the event source or the caches.
    pub fn dependencies_for_country(
        &mut self,
        events: &mut impl EventSource,
        tag: &str,
        source: DataSource,
    ) -> EngineResult<Vec<EventDependencyGraph>> {
        let tag = tag.to_uppercase();
        let key = format!("{source}:{tag}");
        if let Some(graphs) = self.country_cache.get(&key) {
            debug!("dependency cache hit for {key}");
            return Ok(graphs);
        }

        let country_events = events.events_by_country(&tag, source)?;
        let all_events = events.all_events(source)?;
        let graphs = self.dependencies_for_country_events(&country_events, &all_events);
        info!("analyzed {} {tag} event(s) from {source}", graphs.len());

        self.country_cache.set(&key, graphs.clone(), Ttl::Never)?;
        for graph in &graphs {
            self.event_cache
                .set(&event_key(source, &graph.event_id), graph.clone(), Ttl::Never)?;
        }
        Ok(graphs)
    }

    /// Graph for a single event, or `None` if the id is unknown.
    ///
    /// Ids under a `flavor_<tag>` namespace are analyzed together with the
    /// rest of that country's events.
    ///
    /// # Errors
    /// Propagates failures from the event source or the caches.
    pub fn dependencies_for_event_id(
        &mut self,
        events: &mut impl EventSource,
        event_id: &str,
        source: DataSource,
    ) -> EngineResult<Option<EventDependencyGraph>> {
        let key = event_key(source, event_id);
        if let Some(graph) = self.event_cache.get(&key) {
            return Ok(Some(graph));
        }

        let Some(event) = events.event_by_id(event_id, source)? else {
            debug!("no event {event_id} in {source}");
            return Ok(None);
        };

        if let Some(tag) = tag_from_namespace(event_id) {
            let graphs = self.dependencies_for_country(events, &tag, source)?;
            if let Some(found) = graphs
                .into_iter()
                .find(|graph| graph.event_id.eq_ignore_ascii_case(event_id))
            {
                return Ok(Some(found));
            }
        }

        let all_events = events.all_events(source)?;
        let graph = dependencies_for_event(&event, &EventIndex::new(&all_events));
        self.event_cache
            .set(&event_key(source, &graph.event_id), graph.clone(), Ttl::Never)?;
        Ok(Some(graph))
    }

    /// # Errors
    /// Fails if a cache file cannot be removed.
    pub fn clear_cache(&mut self) -> EngineResult<()> {
        self.country_cache.clear()?;
        self.event_cache.clear()?;
        Ok(())
    }

    pub fn cache_stats(&self) -> DependencyCacheStats {
        DependencyCacheStats {
            country: self.country_cache.stats(),
            event: self.event_cache.stats(),
        }
    }
}
