//! Recursive-descent parser producing a keyed block tree.
//!
//! A document is a sequence of `key [op] value` clauses where a value is a
//! scalar or a braced sub-document. Repeated keys within one block are
//! grouped: the first occurrence stays a plain node, the second turns the slot
//! into an [`Node::Array`] holding both, later ones are appended.

use eventlens_data::ScriptValue;

use crate::error::ScriptError;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Braced block. The document root has no key.
    Object {
        key: Option<String>,
        operator: Option<String>,
        children: Vec<Node>,
    },
    /// Every occurrence of a key repeated within one block, in source order.
    Array { key: String, children: Vec<Node> },
    Scalar {
        key: String,
        operator: String,
        value: ScriptValue,
    },
}

impl Node {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Object { key, .. } => key.as_deref(),
            Self::Array { key, .. } | Self::Scalar { key, .. } => Some(key),
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Self::Object { children, .. } | Self::Array { children, .. } => children,
            Self::Scalar { .. } => &[],
        }
    }

    /// Operator as written, `=` when a block omitted it.
    pub fn operator(&self) -> &str {
        match self {
            Self::Object { operator, .. } => operator.as_deref().unwrap_or("="),
            Self::Scalar { operator, .. } => operator,
            Self::Array { .. } => "=",
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    /// Comments are dropped up front.
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens = tokens.into_iter().filter(|t| !t.kind.is_comment()).collect();
        Self { tokens, index: 0 }
    }

    /// Parse the whole token stream into a root object.
    ///
    /// # Errors
    /// Returns [`ScriptError::Parse`] for a bad key, a missing value, or
    /// unbalanced braces.
    pub fn parse_document(mut self) -> Result<Node, ScriptError> {
        let children = self.parse_block(false)?;
        Ok(Node::Object {
            key: None,
            operator: None,
            children,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn current_line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.position.line)
    }

    fn error(&self, expected: &str) -> ScriptError {
        ScriptError::Parse {
            expected: expected.to_string(),
            found: self.peek().map_or("end of input", |t| t.kind.describe()).to_string(),
            line: self.current_line(),
        }
    }

    /// Clauses up to a closing brace (nested) or end of input (top level).
    fn parse_block(&mut self, nested: bool) -> Result<Vec<Node>, ScriptError> {
        let mut children = Vec::new();
        loop {
            match self.peek().map(|t| &t.kind) {
                None if nested => return Err(self.error("'}'")),
                None => return Ok(children),
                Some(TokenKind::CloseBrace) if nested => {
                    self.advance();
                    return Ok(children);
                },
                Some(TokenKind::CloseBrace) => return Err(self.error("key")),
                Some(_) => {
                    let node = self.parse_clause()?;
                    add_child(&mut children, node);
                },
            }
        }
    }

    fn parse_clause(&mut self) -> Result<Node, ScriptError> {
        let key = match self.peek().map(|t| &t.kind) {
            Some(
                TokenKind::Identifier(s) | TokenKind::Str(s) | TokenKind::Date(s) | TokenKind::Number { raw: s, .. },
            ) => s.clone(),
            _ => return Err(self.error("key")),
        };
        self.advance();

        let operator = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Equals) => {
                self.advance();
                Some("=".to_string())
            },
            Some(TokenKind::Operator(op)) => {
                let op = op.clone();
                self.advance();
                Some(op)
            },
            _ => None,
        };

        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::OpenBrace) => {
                self.advance();
                let children = self.parse_block(true)?;
                Ok(Node::Object {
                    key: Some(key),
                    operator,
                    children,
                })
            },
            Some(TokenKind::CloseBrace | TokenKind::Equals | TokenKind::Operator(_)) | None => {
                Err(self.error("value"))
            },
            Some(_) => {
                let Some(token) = self.advance() else {
                    return Err(self.error("value"));
                };
                Ok(Node::Scalar {
                    key,
                    operator: operator.unwrap_or_else(|| "=".to_string()),
                    value: token_value(token.kind),
                })
            },
        }
    }
}

fn token_value(kind: TokenKind) -> ScriptValue {
    match kind {
        TokenKind::Identifier(s) | TokenKind::Str(s) | TokenKind::Date(s) => ScriptValue::Text(s),
        TokenKind::Number { value, .. } => ScriptValue::Number(value),
        TokenKind::Boolean(b) => ScriptValue::Bool(b),
        other => ScriptValue::Text(other.describe().to_string()),
    }
}

fn add_child(children: &mut Vec<Node>, node: Node) {
    let Some(slot) = children.iter_mut().find(|c| c.key() == node.key()) else {
        children.push(node);
        return;
    };
    if let Node::Array { children, .. } = slot {
        children.push(node);
        return;
    }
    let key = node.key().unwrap_or_default().to_string();
    let placeholder = Node::Array {
        key: String::new(),
        children: Vec::new(),
    };
    let first = std::mem::replace(slot, placeholder);
    *slot = Node::Array {
        key,
        children: vec![first, node],
    };
}

/// Tokens to root node.
///
/// # Errors
/// See [`Parser::parse_document`].
pub fn parse(tokens: Vec<Token>) -> Result<Node, ScriptError> {
    Parser::new(tokens).parse_document()
}
