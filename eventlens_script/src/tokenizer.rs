//! Hand-written scanner for the event script dialect.
//!
//! Whitespace is dropped; comments are kept as tokens so tools can see them,
//! the parser filters them out.

use crate::error::ScriptError;
use crate::token::{Position, Token, TokenKind};

pub struct Tokenizer<'src> {
    rest: &'src str,
    index: usize,
    line: usize,
    column: usize,
}

impl<'src> Tokenizer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            rest: source,
            index: 0,
            line: 1,
            column: 1,
        }
    }

    /// Next token, or `None` at end of input.
    ///
    /// # Errors
    /// Fails on an unexpected character or an unterminated string.
    pub fn next_token(&mut self) -> Result<Option<Token>, ScriptError> {
        self.skip_whitespace();
        let Some(c) = self.peek_char() else {
            return Ok(None);
        };
        let start = self.here();
        let kind = match c {
            '#' => self.scan_comment(),
            '{' => {
                self.advance();
                TokenKind::OpenBrace
            },
            '}' => {
                self.advance();
                TokenKind::CloseBrace
            },
            '=' => {
                self.advance();
                TokenKind::Equals
            },
            '>' | '<' | '!' => {
                self.advance();
                let mut op = c.to_string();
                if self.peek_char() == Some('=') {
                    self.advance();
                    op.push('=');
                }
                TokenKind::Operator(op)
            },
            '"' | '\'' => self.scan_string(c, start)?,
            c if c.is_ascii_digit() => self.scan_number(),
            '-' if self.peek_char_n(1).is_some_and(|n| n.is_ascii_digit()) => self.scan_number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_word(),
            ch => {
                return Err(ScriptError::Lex {
                    line: start.line,
                    column: start.column,
                    ch,
                });
            },
        };
        Ok(Some(Token::new(kind, start)))
    }

    fn here(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            index: self.index,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        let len = c.len_utf8();
        self.rest = &self.rest[len..];
        self.index += len;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(|c| matches!(c, ' ' | '\t' | '\r' | '\n')) {
            self.advance();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    fn scan_comment(&mut self) -> TokenKind {
        TokenKind::Comment(self.take_while(|c| c != '\n'))
    }

    /// Quoted string; a backslash takes the following character literally.
    fn scan_string(&mut self, quote: char, start: Position) -> Result<TokenKind, ScriptError> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.advance() {
                    Some(escaped) => value.push(escaped),
                    None => break,
                },
                Some(c) => value.push(c),
                None => break,
            }
        }
        Err(ScriptError::UnterminatedString {
            line: start.line,
            column: start.column,
        })
    }

    /// Digits, dots and dashes. Three non-empty dot groups make a date; a run
    /// that is not a valid number (`10-20`, `1.2.3.4`) stays an identifier.
    fn scan_number(&mut self) -> TokenKind {
        let lexeme = self.take_while(|c| c.is_ascii_digit() || c == '.' || c == '-');
        let groups: Vec<&str> = lexeme.split('.').collect();
        if groups.len() == 3 && groups.iter().all(|g| !g.is_empty()) {
            return TokenKind::Date(lexeme);
        }
        match lexeme.parse::<f64>() {
            Ok(value) => TokenKind::Number { value, raw: lexeme },
            Err(_) => TokenKind::Identifier(lexeme),
        }
    }

    /// Identifier, or a boolean literal when the whole word is one.
    fn scan_word(&mut self) -> TokenKind {
        let word = self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        match word.as_str() {
            "yes" | "true" => TokenKind::Boolean(true),
            "no" | "false" => TokenKind::Boolean(false),
            _ => TokenKind::Identifier(word),
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Tokenize a whole document.
///
/// # Errors
/// Returns the first lexical error encountered.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    Tokenizer::new(source).collect()
}

/// Buffer every chunk and tokenize once; `None` when the stream is empty.
///
/// # Errors
/// Returns the first lexical error in the concatenated text.
pub fn tokenize_stream<I, S>(chunks: I) -> Result<Option<Vec<Token>>, ScriptError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buffer = String::new();
    for chunk in chunks {
        buffer.push_str(chunk.as_ref());
    }
    if buffer.is_empty() {
        return Ok(None);
    }
    tokenize(&buffer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(value: f64, raw: &str) -> TokenKind {
        TokenKind::Number {
            value,
            raw: raw.into(),
        }
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn whitespace_never_produces_tokens() {
        assert!(kinds(" \t\r\n\n  ").is_empty());
        assert_eq!(
            kinds("a   =\n\n\tb"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Equals,
                TokenKind::Identifier("b".into()),
            ]
        );
    }

    #[test]
    fn each_comment_line_is_one_token() {
        let tokens = kinds("# first\nx = 1 # trailing\n# last");
        let comments: Vec<_> = tokens.iter().filter(|k| k.is_comment()).collect();
        assert_eq!(comments.len(), 3);
        assert_eq!(tokens[0], TokenKind::Comment("# first".into()));
    }

    #[test]
    fn dates_numbers_and_negatives() {
        assert_eq!(
            kinds("1444.11.11 1.5 -3 10"),
            vec![
                TokenKind::Date("1444.11.11".into()),
                number(1.5, "1.5"),
                number(-3.0, "-3"),
                number(10.0, "10"),
            ]
        );
    }

    #[test]
    fn booleans_only_as_whole_words() {
        assert_eq!(
            kinds("yes no true false no_heir yesterday"),
            vec![
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
                TokenKind::Identifier("no_heir".into()),
                TokenKind::Identifier("yesterday".into()),
            ]
        );
    }

    #[test]
    fn operators_and_braces() {
        assert_eq!(
            kinds("a >= 1 b != 2 { } c < 3"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Operator(">=".into()),
                number(1.0, "1"),
                TokenKind::Identifier("b".into()),
                TokenKind::Operator("!=".into()),
                number(2.0, "2"),
                TokenKind::OpenBrace,
                TokenKind::CloseBrace,
                TokenKind::Identifier("c".into()),
                TokenKind::Operator("<".into()),
                number(3.0, "3"),
            ]
        );
    }

    #[test]
    fn strings_unescape_eagerly() {
        assert_eq!(
            kinds(r#""say \"hi\"" 'it\'s'"#),
            vec![TokenKind::Str("say \"hi\"".into()), TokenKind::Str("it's".into())]
        );
    }

    #[test]
    fn dotted_identifiers_stay_whole() {
        assert_eq!(kinds("flavor_eng.10"), vec![TokenKind::Identifier("flavor_eng.10".into())]);
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let tokens = tokenize("a = b\n  c = 1").unwrap();
        let c = &tokens[3];
        assert_eq!(c.position.line, 2);
        assert_eq!(c.position.column, 3);
        assert_eq!(c.position.index, 8);
    }

    #[test]
    fn unexpected_character_reports_location() {
        let err = tokenize("a = b\nc = @").unwrap_err();
        assert!(matches!(
            err,
            ScriptError::Lex {
                line: 2,
                column: 5,
                ch: '@'
            }
        ));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("title = \"never closed").unwrap_err();
        assert!(matches!(err, ScriptError::UnterminatedString { line: 1, column: 9 }));
    }

    #[test]
    fn numeric_runs_that_are_not_numbers_keep_their_text() {
        assert_eq!(
            kinds("range = 10-20 version = 1.2.3.4"),
            vec![
                TokenKind::Identifier("range".into()),
                TokenKind::Equals,
                TokenKind::Identifier("10-20".into()),
                TokenKind::Identifier("version".into()),
                TokenKind::Equals,
                TokenKind::Identifier("1.2.3.4".into()),
            ]
        );
    }

    #[test]
    fn numbers_remember_how_they_were_written() {
        assert_eq!(kinds("01 1.50"), vec![number(1.0, "01"), number(1.5, "1.50")]);
    }

    #[test]
    fn stream_buffers_chunks() {
        let tokens = tokenize_stream(["id = flav", "or.1"]).unwrap().unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Identifier("flavor.1".into()));
        assert!(tokenize_stream(Vec::<String>::new()).unwrap().is_none());
    }
}
