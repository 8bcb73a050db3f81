#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! `eventlens` command-line front end.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::{Color, Colorize};
use eventlens_data::{DependencyType, EventDependencyGraph};
use eventlens_engine::{DataSource, DependencyService, EngineConfig, GameDataService};
use log::info;
use serde::Serialize;

#[derive(Parser)]
#[command(author, version, about = "Inspect event scripts: dependencies, localization, and caches.")]
struct Cli {
    /// Configuration file (defaults to ./eventlens.toml, then the user config directory).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Events tree to read (vanilla or local); defaults to the configured source.
    #[arg(long, global = true, value_name = "SOURCE")]
    source: Option<DataSource>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one script file and print its events as JSON.
    Parse {
        file: PathBuf,
        /// Stream the file through the chunked reader.
        #[arg(long)]
        streaming: bool,
    },
    /// List countries that have a flavor event file.
    Countries,
    /// Dependency graphs for every event of a country.
    Deps {
        /// Country tag, e.g. ENG.
        tag: String,
        /// Print the graphs as JSON.
        #[arg(long)]
        json: bool,
        /// Only show references to events that do not exist.
        #[arg(long)]
        missing_only: bool,
    },
    /// Dependency graph for one event id.
    EventDeps {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Resolve a localization key.
    Resolve {
        key: String,
        #[arg(long, value_name = "LANGUAGE")]
        lang: Option<String>,
        #[arg(long, value_name = "LANGUAGE")]
        fallback: Option<String>,
        /// Leave `$variable$` spans unexpanded.
        #[arg(long)]
        raw: bool,
    },
    /// A country's events with resolved text, as JSON.
    Events {
        tag: String,
        #[arg(long, value_name = "LANGUAGE")]
        lang: Option<String>,
        #[arg(long, value_name = "LANGUAGE")]
        fallback: Option<String>,
    },
    /// Show cache statistics.
    CacheStats,
    /// Remove every cached entry.
    ClearCache,
}

#[derive(Serialize)]
struct AllCacheStats {
    game_data: eventlens_engine::game_data::GameDataCacheStats,
    dependencies: eventlens_engine::dependency::DependencyCacheStats,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref());
    let source = cli.source.unwrap_or(config.default_source);
    info!("eventlens {} using {source} data", eventlens_engine::EVENTLENS_VERSION);

    let mut deps = DependencyService::new(&config).context("while opening dependency caches")?;
    let mut data = GameDataService::new(config).context("while starting game data service")?;
    let outcome = run(cli.command, source, &mut data, &mut deps);
    data.shutdown();
    outcome
}

fn run(command: Commands, source: DataSource, data: &mut GameDataService, deps: &mut DependencyService) -> Result<()> {
    match command {
        Commands::Parse { file, streaming } => parse_file(data, &file, streaming),
        Commands::Countries => {
            let countries = data.discover_countries(source)?;
            for country in &countries {
                println!(
                    "{}  {:<30} {:>4} events",
                    country.tag.bold().bright_blue(),
                    country.name,
                    country.event_count
                );
            }
            println!("{} countries", countries.len());
            Ok(())
        },
        Commands::Deps { tag, json, missing_only } => {
            let mut graphs = deps.dependencies_for_country(data, &tag, source)?;
            if missing_only {
                for graph in &mut graphs {
                    graph.dependencies.retain(|dep| dep.is_missing == Some(true));
                }
                graphs.retain(|graph| !graph.dependencies.is_empty());
            }
            if json {
                print_json(&graphs)
            } else {
                graphs.iter().for_each(print_graph);
                Ok(())
            }
        },
        Commands::EventDeps { id, json } => match deps.dependencies_for_event_id(data, &id, source)? {
            Some(graph) if json => print_json(&graph),
            Some(graph) => {
                print_graph(&graph);
                Ok(())
            },
            None => anyhow::bail!("no event '{id}' in {source} data"),
        },
        Commands::Resolve {
            key,
            lang,
            fallback,
            raw,
        } => {
            let localization = data.localization();
            let mut options = localization.options_for(lang.as_deref());
            if let Some(fallback) = fallback {
                options = options.with_fallback(fallback);
            }
            if !raw {
                options = options.with_variables();
            }
            println!("{}", localization.resolve(&key, &options));
            Ok(())
        },
        Commands::Events { tag, lang, fallback } => {
            let events = data.localized_events_by_country(&tag, source, lang.as_deref(), fallback.as_deref())?;
            print_json(&events)
        },
        Commands::CacheStats => print_json(&AllCacheStats {
            game_data: data.cache_stats(),
            dependencies: deps.cache_stats(),
        }),
        Commands::ClearCache => {
            data.clear_cache()?;
            deps.clear_cache()?;
            println!("{}", "caches cleared".green());
            Ok(())
        },
    }
}

fn parse_file(data: &mut GameDataService, file: &Path, streaming: bool) -> Result<()> {
    let parser = data.parser_mut();
    let events = if streaming {
        parser.parse_file_streaming(file)
    } else {
        parser.parse_file_pooled(file)
    }
    .with_context(|| format!("while parsing '{}'", file.display()))?;
    print_json(&events)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_graph(graph: &EventDependencyGraph) {
    println!("{}", graph.event_id.bold().bright_yellow());
    if graph.dependencies.is_empty() {
        println!("  {}", "(no dependencies)".dimmed());
    }
    for dep in &graph.dependencies {
        let (label, color) = match dep.kind {
            DependencyType::Flag => (dep.kind.as_str(), Color::Cyan),
            DependencyType::Temporal => (dep.kind.as_str(), Color::Magenta),
            DependencyType::EventReference if dep.is_missing == Some(true) => ("missing", Color::Red),
            DependencyType::EventReference => (dep.kind.as_str(), Color::Green),
        };
        println!(
            "  {} {:<32} {}",
            format!("{label:<16}").color(color),
            dep.key,
            dep.path.as_deref().unwrap_or("root").dimmed()
        );
    }
}
