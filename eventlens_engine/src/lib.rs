#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
//! eventlens_engine: services over parsed event scripts.
//!
//! [`GameDataService`] finds countries and their events, [`DependencyService`]
//! turns events into dependency graphs, and [`LocalizationService`] resolves
//! player-facing text. Parsing goes through [`EventParserService`], backed by
//! the [`ParserPool`] and the on-disk [`CacheService`].

pub const EVENTLENS_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cache;
pub mod config;
pub mod dependency;
pub mod error;
pub mod event_parser;
pub mod game_data;
pub mod localization;
pub mod pool;

pub use cache::{CacheService, CacheStats, Ttl};
pub use config::{DataSource, EngineConfig};
pub use dependency::{DependencyService, EventIndex, EventSource};
pub use error::{EngineError, EngineResult};
pub use event_parser::EventParserService;
pub use game_data::GameDataService;
pub use localization::{LocalizationError, LocalizationService};
pub use pool::ParserPool;
