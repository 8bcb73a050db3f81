//! Token types produced by the tokenizer.

use std::fmt;

/// Where a token starts in the normalized source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// 1-based line.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
    /// Byte offset.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Str(String),
    /// Parsed value and the lexeme as written.
    Number { value: f64, raw: String },
    /// `YYYY.MM.DD`, kept verbatim.
    Date(String),
    Boolean(bool),
    Equals,
    OpenBrace,
    CloseBrace,
    /// One of `>`, `<`, `!`, `>=`, `<=`, `!=`.
    Operator(String),
    /// Comment text including the leading `#`.
    Comment(String),
}

impl TokenKind {
    /// Short name used in parse error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Identifier(_) => "identifier",
            Self::Str(_) => "string",
            Self::Number { .. } => "number",
            Self::Date(_) => "date",
            Self::Boolean(_) => "boolean",
            Self::Equals => "'='",
            Self::OpenBrace => "'{'",
            Self::CloseBrace => "'}'",
            Self::Operator(_) => "operator",
            Self::Comment(_) => "comment",
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Self::Comment(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Identifier(s)
            | TokenKind::Date(s)
            | TokenKind::Operator(s)
            | TokenKind::Comment(s)
            | TokenKind::Number { raw: s, .. } => {
                write!(f, "{s}")
            },
            TokenKind::Str(s) => write!(f, "\"{s}\""),
            TokenKind::Boolean(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            TokenKind::Equals => write!(f, "="),
            TokenKind::OpenBrace => write!(f, "{{"),
            TokenKind::CloseBrace => write!(f, "}}"),
        }
    }
}
