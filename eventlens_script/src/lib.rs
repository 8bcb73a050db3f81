//! eventlens_script: front end for the clause-based event script dialect.
//!
//! Source text goes through three stages:
//! - [`tokenizer`] turns text into tokens (comments kept, whitespace dropped)
//! - [`parser`] builds a keyed block tree, grouping repeated keys
//! - [`extractor`] turns event blocks into [`ParsedEvent`] records
//!
//! [`reader`] handles decoding files from disk (UTF-8 or Windows-1252).

pub mod error;
pub mod extractor;
pub mod parser;
pub mod reader;
pub mod token;
pub mod tokenizer;

use std::path::Path;

use eventlens_data::ParsedEvent;

pub use error::ScriptError;
pub use extractor::{extract, to_condition, to_script_value};
pub use parser::{Node, parse};
pub use reader::{ChunkedReader, DEFAULT_CHUNK_SIZE, read_script_file, read_script_file_chunked};
pub use token::{Position, Token, TokenKind};
pub use tokenizer::{tokenize, tokenize_stream};

/// Tokenize, parse, and extract events from script text.
///
/// # Errors
/// Returns the first lexical or syntactic error.
pub fn parse_events(source: &str) -> Result<Vec<ParsedEvent>, ScriptError> {
    let tokens = tokenize(source)?;
    let root = parse(tokens)?;
    Ok(extract(&root))
}

/// Read a script file from disk and extract its events.
///
/// # Errors
/// Returns [`ScriptError::SourceIo`] if the file cannot be read, otherwise
/// any error from [`parse_events`].
pub fn parse_events_file(path: &Path) -> Result<Vec<ParsedEvent>, ScriptError> {
    let text = read_script_file(path)?;
    parse_events(&text)
}
