//! Flat JSON tokenizer.
//!
//! Produces a bounded list of [`Token`] spans for one JSON document instead of a
//! tree. Every token records its byte span, its number of direct children and a
//! link to its parent, which is enough to walk a response once and pick out a
//! handful of fields.
//!
//! Lexing and validation are done by `serde_json`: each container is read as a
//! sequence of borrowed [`RawValue`]s, whose positions inside the input give the
//! token spans.

use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::error::Category;
use serde_json::value::RawValue;
use thiserror::Error;

/// Default number of tokens a [`TokenBuffer`] accepts for one document.
pub const DEFAULT_TOKEN_CAPACITY: usize = 10 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Object,
    Array,
    String,
    /// Numbers, booleans and `null`.
    Primitive,
}

/// One lexical unit of the input.
///
/// String spans exclude the surrounding quotes; container spans include their
/// brackets. `size` is the number of keys of an object, the number of elements
/// of an array, and 1 for a key that has a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub size: usize,
    /// Enclosing container, or the key token for an object member value.
    pub parent: Option<usize>,
}

impl Token {
    pub fn raw<'a>(&self, input: &'a [u8]) -> &'a [u8] {
        &input[self.start..self.end]
    }

    pub fn is_null(&self, input: &[u8]) -> bool {
        self.kind == TokenKind::Primitive && self.raw(input) == b"null"
    }

    /// Decoded text of a string token.
    ///
    /// Escapes that do not form a valid code point (lone surrogates) keep the
    /// raw span as written.
    pub fn unescaped(&self, input: &[u8]) -> String {
        self.start
            .checked_sub(1)
            .and_then(|open| input.get(open..=self.end))
            .and_then(|quoted| serde_json::from_slice::<String>(quoted).ok())
            .unwrap_or_else(|| String::from_utf8_lossy(self.raw(input)).into_owned())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("invalid JSON at line {line} column {column}")]
    Invalid { line: usize, column: usize },

    #[error("unexpected end of input")]
    Partial,

    #[error("document needs more than {capacity} tokens")]
    NoMemory { capacity: usize },
}

impl From<serde_json::Error> for TokenizeError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            Category::Eof => Self::Partial,
            Category::Io | Category::Syntax | Category::Data => Self::Invalid {
                line: err.line(),
                column: err.column(),
            },
        }
    }
}

/// Reusable, capacity-bounded token storage.
pub struct TokenBuffer {
    tokens: Vec<Token>,
    capacity: usize,
}

impl TokenBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tokens: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokenizes `input`, replacing whatever the buffer held before.
    ///
    /// Empty or whitespace-only input yields no tokens.
    ///
    /// # Errors
    ///
    /// Returns [`TokenizeError::Invalid`] for malformed JSON or trailing data
    /// after the root value, [`TokenizeError::Partial`] when the input stops
    /// inside a value, and [`TokenizeError::NoMemory`] when the document has
    /// more tokens than the buffer capacity.
    pub fn tokenize(&mut self, input: &[u8]) -> Result<&[Token], TokenizeError> {
        self.tokens.clear();
        if input.iter().all(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
            return Ok(&self.tokens);
        }

        let root: &RawValue = serde_json::from_slice(input)?;
        let mut walker = Walker {
            origin: input.as_ptr() as usize,
            tokens: &mut self.tokens,
            capacity: self.capacity,
        };
        walker.value(root, None)?;

        Ok(&self.tokens)
    }
}

impl Default for TokenBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TOKEN_CAPACITY)
    }
}

/// Emits tokens in document order for an already validated document.
struct Walker<'t> {
    origin: usize,
    tokens: &'t mut Vec<Token>,
    capacity: usize,
}

impl Walker<'_> {
    fn span(&self, raw: &RawValue) -> (usize, usize) {
        let text = raw.get();
        let start = text.as_ptr() as usize - self.origin;
        (start, start + text.len())
    }

    fn push(
        &mut self,
        kind: TokenKind,
        (start, end): (usize, usize),
        parent: Option<usize>,
    ) -> Result<usize, TokenizeError> {
        if self.tokens.len() >= self.capacity {
            return Err(TokenizeError::NoMemory {
                capacity: self.capacity,
            });
        }
        self.tokens.push(Token {
            kind,
            start,
            end,
            size: 0,
            parent,
        });
        Ok(self.tokens.len() - 1)
    }

    fn string(&mut self, raw: &RawValue, parent: Option<usize>) -> Result<usize, TokenizeError> {
        let (start, end) = self.span(raw);
        self.push(TokenKind::String, (start + 1, end - 1), parent)
    }

    fn value(&mut self, raw: &RawValue, parent: Option<usize>) -> Result<(), TokenizeError> {
        let span = self.span(raw);
        match raw.get().as_bytes().first() {
            Some(b'{') => {
                let object = self.push(TokenKind::Object, span, parent)?;
                let Members(members) = serde_json::from_str(raw.get())?;
                self.tokens[object].size = members.len();
                for (key, value) in members {
                    let key = self.string(key, Some(object))?;
                    self.tokens[key].size = 1;
                    self.value(value, Some(key))?;
                }
            }
            Some(b'[') => {
                let array = self.push(TokenKind::Array, span, parent)?;
                let elements: Vec<&RawValue> = serde_json::from_str(raw.get())?;
                self.tokens[array].size = elements.len();
                for element in elements {
                    self.value(element, Some(array))?;
                }
            }
            Some(b'"') => {
                self.string(raw, parent)?;
            }
            _ => {
                self.push(TokenKind::Primitive, span, parent)?;
            }
        }
        Ok(())
    }
}

/// Object members in document order, keys included, as borrowed raw JSON.
struct Members<'a>(Vec<(&'a RawValue, &'a RawValue)>);

impl<'de> Deserialize<'de> for Members<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MembersVisitor;

        impl<'de> Visitor<'de> for MembersVisitor {
            type Value = Members<'de>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut members = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<&'de RawValue, &'de RawValue>()? {
                    members.push(entry);
                }
                Ok(Members(members))
            }
        }

        deserializer.deserialize_map(MembersVisitor)
    }
}
