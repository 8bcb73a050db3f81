//! Engine error type.

use std::path::PathBuf;

use eventlens_script::ScriptError;

use crate::cache::CacheError;
use crate::localization::LocalizationError;

/// Errors surfaced by the engine services.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Localization(#[from] LocalizationError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("parser worker {worker} failed: {message}")]
    WorkerFailure { worker: usize, message: String },
    #[error("parser pool has been shut down")]
    Shutdown,
    #[error("no events directory configured for source '{source_name}' (set {variable})")]
    UnknownSource {
        source_name: String,
        variable: &'static str,
    },
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;
