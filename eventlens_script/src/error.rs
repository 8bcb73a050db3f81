use std::path::PathBuf;

/// Errors raised while reading, tokenizing, or parsing event scripts.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("unexpected character '{ch}' at {line}:{column}")]
    Lex { line: usize, column: usize, ch: char },
    #[error("unterminated string starting at {line}:{column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("expected {expected} but found {found} at line {line}")]
    Parse { expected: String, found: String, line: usize },
    #[error("unable to read {}: {source}", path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScriptError {
    /// Line the error points at, if it came from the source text.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex { line, .. }
            | Self::UnterminatedString { line, .. }
            | Self::Parse { line, .. } => Some(*line),
            Self::SourceIo { .. } => None,
        }
    }
}
