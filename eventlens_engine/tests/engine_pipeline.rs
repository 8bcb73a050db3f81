use std::fs;
use std::path::PathBuf;

use eventlens_data::{DependencyType, EventDependency, EventDependencyGraph, ResolveOptions};
use eventlens_engine::{DataSource, DependencyService, EngineConfig, EventParserService, GameDataService};
use tempfile::TempDir;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn config(cache: &TempDir, pooled: bool) -> EngineConfig {
    EngineConfig {
        cache_dir: cache.path().to_path_buf(),
        enable_async_parsing: pooled,
        parser_worker_count: Some(2),
        vanilla_events_path: Some(fixtures().join("events")),
        localization_path: Some(fixtures().join("localization")),
        ..EngineConfig::default()
    }
}

fn services(cache: &TempDir) -> (GameDataService, DependencyService) {
    let config = config(cache, true);
    let deps = DependencyService::new(&config).expect("dependency caches");
    let data = GameDataService::new(config).expect("game data");
    (data, deps)
}

fn graph<'a>(graphs: &'a [EventDependencyGraph], id: &str) -> &'a EventDependencyGraph {
    graphs
        .iter()
        .find(|g| g.event_id == id)
        .unwrap_or_else(|| panic!("no graph for {id}"))
}

fn at_path<'a>(graph: &'a EventDependencyGraph, path: &str) -> Vec<&'a EventDependency> {
    graph
        .dependencies
        .iter()
        .filter(|d| d.path.as_deref() == Some(path))
        .collect()
}

#[test]
fn missing_event_call_is_reported_once() {
    let cache = TempDir::new().unwrap();
    let (mut data, mut deps) = services(&cache);
    let graphs = deps
        .dependencies_for_country(&mut data, "FRA", DataSource::Vanilla)
        .expect("analysis ok");
    assert_eq!(graphs.len(), 1);

    let refs: Vec<_> = graphs[0].of_kind(DependencyType::EventReference).collect();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].path.as_deref(), Some("immediate.country_event.id"));
    assert_eq!(refs[0].target_event_id.as_deref(), Some("missing.99"));
    assert_eq!(refs[0].is_missing, Some(true));
    assert_eq!(refs[0].source_event_id, "flavor_fra.1");
    data.shutdown();
}

#[test]
fn country_graph_covers_triggers_effects_and_options() {
    let cache = TempDir::new().unwrap();
    let (mut data, mut deps) = services(&cache);
    let graphs = deps
        .dependencies_for_country(&mut data, "eng", DataSource::Vanilla)
        .expect("analysis ok");
    assert_eq!(graphs.len(), 2);
    let first = graph(&graphs, "flavor_eng.1");

    let flag = at_path(first, "trigger.and[0]");
    assert_eq!(flag[0].kind, DependencyType::Flag);
    assert_eq!(flag[0].key, "eng_ready");
    assert_eq!(flag[0].details.as_deref(), Some("has_country_flag"));
    assert_eq!(at_path(first, "trigger.and[1].not")[0].key, "hundred_years_war_over");

    let temporal: Vec<_> = first.of_kind(DependencyType::Temporal).collect();
    assert_eq!(temporal.len(), 1);
    assert_eq!(temporal[0].key, "10");

    assert_eq!(at_path(first, "immediate.set_country_flag")[0].key, "eng_started");
    let chained = at_path(first, "immediate.country_event.id");
    assert_eq!(chained[0].is_missing, Some(false));

    // Resolved against every event in the tree, not just England's.
    let cross = at_path(first, "options[0].trigger.and[0]");
    assert_eq!(cross[0].target_event_id.as_deref(), Some("flavor_fra.1"));
    assert_eq!(cross[0].is_missing, Some(false));
    let missing = at_path(first, "options[0].effects.country_event.id");
    assert_eq!(missing[0].is_missing, Some(true));

    assert!(graph(&graphs, "flavor_eng.2").dependencies.is_empty());
    data.shutdown();
}

#[test]
fn dependency_sets_have_no_duplicates() {
    let cache = TempDir::new().unwrap();
    let (mut data, mut deps) = services(&cache);
    for tag in ["ENG", "FRA"] {
        for graph in deps
            .dependencies_for_country(&mut data, tag, DataSource::Vanilla)
            .unwrap()
        {
            let mut keys: Vec<_> = graph.dependencies.iter().map(EventDependency::dedup_key).collect();
            let before = keys.len();
            keys.sort();
            keys.dedup();
            assert_eq!(keys.len(), before, "duplicate in {}", graph.event_id);
        }
    }
    data.shutdown();
}

#[test]
fn results_survive_a_restart() {
    let cache = TempDir::new().unwrap();
    let first = {
        let (mut data, mut deps) = services(&cache);
        let graphs = deps
            .dependencies_for_country(&mut data, "ENG", DataSource::Vanilla)
            .unwrap();
        data.shutdown();
        graphs
    };
    let (mut data, mut deps) = services(&cache);
    assert_eq!(deps.cache_stats().country.entries, 1);
    let second = deps
        .dependencies_for_country(&mut data, "ENG", DataSource::Vanilla)
        .unwrap();
    assert_eq!(first, second);
    data.shutdown();
}

#[test]
fn single_event_lookup() {
    let cache = TempDir::new().unwrap();
    let (mut data, mut deps) = services(&cache);
    let religion = deps
        .dependencies_for_event_id(&mut data, "religion.3", DataSource::Vanilla)
        .unwrap()
        .expect("religion.3 exists");
    assert_eq!(religion.of_kind(DependencyType::Flag).count(), 1);
    assert_eq!(religion.of_kind(DependencyType::EventReference).next().unwrap().is_missing, Some(false));

    let eng = deps
        .dependencies_for_event_id(&mut data, "FLAVOR_ENG.2", DataSource::Vanilla)
        .unwrap()
        .expect("flavor_eng.2 exists");
    assert_eq!(eng.event_id, "flavor_eng.2");
    assert!(
        deps.dependencies_for_event_id(&mut data, "flavor_eng.404", DataSource::Vanilla)
            .unwrap()
            .is_none()
    );
    data.shutdown();
}

#[test]
fn countries_and_localized_events() {
    let cache = TempDir::new().unwrap();
    let (mut data, _deps) = services(&cache);
    let countries = data.discover_countries(DataSource::Vanilla).unwrap();
    let summary: Vec<_> = countries
        .iter()
        .map(|c| (c.tag.as_str(), c.name.as_str(), c.event_count))
        .collect();
    assert_eq!(summary, vec![("ENG", "England", 2), ("FRA", "France", 1)]);

    let localized = data
        .localized_events_by_country("ENG", DataSource::Vanilla, Some("french"), None)
        .unwrap();
    assert_eq!(localized[0].localized_title.as_deref(), Some("La couronne de England"));
    assert_eq!(localized[0].localized_desc.as_deref(), Some("A new age for England."));
    assert_eq!(localized[0].localized_options[0].localized_name.as_deref(), Some("Onward"));
    assert_eq!(
        localized[0].localized_options[1].localized_name.as_deref(),
        Some("[MISSING] flavor_eng.1.b")
    );

    let english = ResolveOptions::new("english").with_variables();
    assert_eq!(data.localization().resolve("loop_a", &english), "[CYCLE] loop_a");
    data.shutdown();
}

#[test]
fn pooled_and_inline_parsing_agree() {
    let pooled_cache = TempDir::new().unwrap();
    let inline_cache = TempDir::new().unwrap();
    let mut pooled = EventParserService::new(&config(&pooled_cache, true)).unwrap();
    let mut inline = EventParserService::new(&config(&inline_cache, false)).unwrap();
    assert!(pooled.pool().is_some());
    assert!(inline.pool().is_none());

    let dir = fixtures().join("events");
    let a = pooled.parse_directory(&dir).unwrap();
    let b = inline.parse_directory(&dir).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 4);

    pooled.shutdown();
    assert!(pooled.parse_file(&dir.join("flavor_eng.txt")).is_err());
}

#[test]
fn configuration_file_and_environment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eventlens.toml");
    fs::write(
        &path,
        "cache_ttl_seconds = 60.0\nenable_async_parsing = false\ndefault_source = \"local\"\ndefault_language = \"German\"\n",
    )
    .unwrap();
    let mut config = EngineConfig::from_toml_file(&path).unwrap();
    assert!((config.cache_ttl_seconds - 60.0).abs() < f64::EPSILON);
    assert!(!config.enable_async_parsing);
    assert_eq!(config.default_source, DataSource::Local);
    assert_eq!(config.default_language, "german");

    config.apply_overrides(|name| (name == "DEFAULT_SOURCE").then(|| "vanilla".to_string()));
    assert_eq!(config.default_source, DataSource::Vanilla);
    assert!(config.events_path(DataSource::Local).is_err());
}
