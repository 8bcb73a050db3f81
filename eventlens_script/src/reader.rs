//! Reading script files from disk.
//!
//! Game files are a mix of UTF-8 and Windows-1252. Text is tried as UTF-8
//! first and re-decoded as Windows-1252 when that produces replacement
//! characters. The returned text has no BOM and uses `\n` line endings.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;

use crate::error::ScriptError;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

const BOM: char = '\u{feff}';

/// Read and decode a whole script file.
///
/// # Errors
/// Returns [`ScriptError::SourceIo`] if the file cannot be read.
pub fn read_script_file(path: &Path) -> Result<String, ScriptError> {
    let bytes = std::fs::read(path).map_err(|source| ScriptError::SourceIo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decode_bytes(&bytes))
}

/// Decode raw bytes the same way [`read_script_file`] does.
pub fn decode_bytes(bytes: &[u8]) -> String {
    let utf8 = String::from_utf8_lossy(bytes);
    let text = if utf8.contains(char::REPLACEMENT_CHARACTER) {
        WINDOWS_1252.decode_without_bom_handling(bytes).0
    } else {
        utf8
    };
    normalize(&text, true)
}

fn normalize(text: &str, strip_bom: bool) -> String {
    let text = if strip_bom { text.trim_start_matches(BOM) } else { text };
    text.replace("\r\n", "\n")
}

/// Open a file for chunked decoding.
///
/// # Errors
/// Returns [`ScriptError::SourceIo`] if the file cannot be opened.
pub fn read_script_file_chunked(path: &Path, chunk_size: usize) -> Result<ChunkedReader, ScriptError> {
    let file = File::open(path).map_err(|source| ScriptError::SourceIo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ChunkedReader {
        path: path.to_path_buf(),
        file,
        chunk_size: chunk_size.max(1),
        carry: Vec::new(),
        windows_1252: false,
        first: true,
        done: false,
    })
}

/// Iterator over decoded chunks of a script file.
///
/// Once a chunk turns out not to be UTF-8 the rest of the file is decoded as
/// Windows-1252. Multi-byte sequences and `\r\n` pairs split across a read
/// boundary are carried into the next chunk.
pub struct ChunkedReader {
    path: PathBuf,
    file: File,
    chunk_size: usize,
    carry: Vec<u8>,
    windows_1252: bool,
    first: bool,
    done: bool,
}

impl ChunkedReader {
    pub fn is_windows_1252(&self) -> bool {
        self.windows_1252
    }

    fn read_chunk(&mut self) -> Result<(Vec<u8>, bool), ScriptError> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..]).map_err(|source| ScriptError::SourceIo {
                path: self.path.clone(),
                source,
            })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        let eof = filled < self.chunk_size;
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(&buf);
        Ok((bytes, eof))
    }

    fn decode_chunk(&mut self, mut bytes: Vec<u8>, eof: bool) -> String {
        if !eof && bytes.last() == Some(&b'\r') {
            self.carry.push(b'\r');
            bytes.pop();
        }
        if !self.windows_1252 {
            match std::str::from_utf8(&bytes) {
                Ok(text) => return text.to_string(),
                Err(err) if err.error_len().is_none() && !eof => {
                    let valid = err.valid_up_to();
                    let mut tail = bytes.split_off(valid);
                    tail.append(&mut self.carry);
                    self.carry = tail;
                    return String::from_utf8_lossy(&bytes).into_owned();
                },
                Err(_) => {
                    log::debug!("{} is not UTF-8, decoding as Windows-1252", self.path.display());
                    self.windows_1252 = true;
                },
            }
        }
        WINDOWS_1252.decode_without_bom_handling(&bytes).0.into_owned()
    }
}

impl Iterator for ChunkedReader {
    type Item = Result<String, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            let (bytes, eof) = match self.read_chunk() {
                Ok(read) => read,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                },
            };
            if eof {
                self.done = true;
            }
            if bytes.is_empty() {
                continue;
            }
            let text = self.decode_chunk(bytes, eof);
            let text = normalize(&text, self.first);
            self.first = false;
            if text.is_empty() && !self.done {
                continue;
            }
            return Some(Ok(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_with(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn utf8_with_bom_and_crlf() {
        let file = temp_with("\u{feff}title = \"Caf\u{e9}\"\r\nid = 1\r\n".as_bytes());
        let text = read_script_file(file.path()).unwrap();
        assert_eq!(text, "title = \"Caf\u{e9}\"\nid = 1\n");
    }

    #[test]
    fn falls_back_to_windows_1252() {
        // 0xE9 is 'é' in Windows-1252 and invalid on its own in UTF-8.
        let file = temp_with(b"name = \"Caf\xe9\"\n");
        let text = read_script_file(file.path()).unwrap();
        assert_eq!(text, "name = \"Caf\u{e9}\"\n");
    }

    #[test]
    fn missing_file_is_source_io() {
        let err = read_script_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, ScriptError::SourceIo { .. }));
    }

    #[test]
    fn chunked_keeps_split_multibyte_sequences() {
        // "é" is two bytes in UTF-8; a chunk size of 5 splits it.
        let source = "abcd\u{e9}fgh\r\nij";
        let file = temp_with(source.as_bytes());
        let reader = read_script_file_chunked(file.path(), 5).unwrap();
        let joined: String = reader.map(|chunk| chunk.unwrap()).collect();
        assert_eq!(joined, "abcd\u{e9}fgh\nij");
    }

    #[test]
    fn chunked_switches_to_windows_1252_for_good() {
        let file = temp_with(b"ab\xe9cdef\xe8gh");
        let mut reader = read_script_file_chunked(file.path(), 4).unwrap();
        let mut joined = String::new();
        for chunk in reader.by_ref() {
            joined.push_str(&chunk.unwrap());
        }
        assert!(reader.is_windows_1252());
        assert_eq!(joined, "ab\u{e9}cdef\u{e8}gh");
    }
}
