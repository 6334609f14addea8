//! Field-path queries over untyped JSON.
//!
//! Supports the subset of kubectl's JSONPath templates that admission
//! policies need:
//! - `.field` - child access
//! - `['field']` / `["field"]` - child access for keys that are not identifiers
//! - `[N]` - sequence index
//! - `[*]` - every element of a sequence
//!
//! An expression may be wrapped in template braces (`{.spec.x}`) and may
//! start with `$`. Whether missing keys are tolerated is decided by the
//! caller on each evaluation, not by the expression.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::write_key;

/// One step of a compiled path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Child of a mapping
    Field(String),
    /// Element of a sequence
    Index(usize),
    /// Every element of a sequence
    Wildcard,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write_key(f, name),
            Segment::Index(index) => write!(f, "[{}]", index),
            Segment::Wildcard => write!(f, "[*]"),
        }
    }
}

/// Errors from compiling or evaluating a path.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum PathError {
    /// The expression is malformed
    #[error("unable to parse path `{expression}` at offset {offset}: {message}")]
    Parse {
        expression: String,
        offset: usize,
        message: String,
    },

    /// A key or index is absent and missing keys are not tolerated
    #[error("{path} is not found")]
    Evaluation { path: String },
}

/// A compiled field-path expression.
///
/// Immutable after compilation, so one instance can be shared across
/// concurrent evaluations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathQuery {
    expression: String,
    segments: Vec<Segment>,
}

impl PathQuery {
    /// Compile `expression` into a reusable query.
    pub fn compile(expression: &str) -> Result<Self, PathError> {
        let trimmed = expression.trim();
        let (body, base) = match trimmed.strip_prefix('{') {
            Some(inner) => match inner.strip_suffix('}') {
                Some(inner) => (inner, 1),
                None => {
                    return Err(PathError::Parse {
                        expression: expression.to_string(),
                        offset: trimmed.len(),
                        message: "unclosed template brace".to_string(),
                    });
                }
            },
            None => (trimmed, 0),
        };
        let (body, base) = match body.strip_prefix('$') {
            Some(rest) => (rest, base + 1),
            None => (body, base),
        };

        let segments = Parser {
            expression,
            input: body,
            pos: 0,
            base,
        }
        .parse()?;

        Ok(Self {
            expression: expression.to_string(),
            segments,
        })
    }

    /// The expression this query was compiled from.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Evaluate the query against `root`.
    ///
    /// Matches are returned in discovery order: depth-first, left-to-right
    /// through each wildcard expansion. With `allow_missing`, a branch that
    /// hits an absent key, an out-of-range index or a value of the wrong
    /// shape contributes nothing; without it, that branch fails the whole
    /// evaluation.
    pub fn evaluate<'v>(
        &self,
        root: &'v Value,
        allow_missing: bool,
    ) -> Result<Vec<&'v Value>, PathError> {
        let mut current = vec![root];

        for (depth, segment) in self.segments.iter().enumerate() {
            let mut next = Vec::with_capacity(current.len());
            for value in current {
                match step(segment, value) {
                    Some(children) => next.extend(children),
                    None if allow_missing => {}
                    None => {
                        return Err(PathError::Evaluation {
                            path: render(self.segments.iter().take(depth + 1)),
                        });
                    }
                }
            }
            current = next;
        }

        Ok(current)
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn step<'v>(segment: &Segment, value: &'v Value) -> Option<Vec<&'v Value>> {
    match (segment, value) {
        (Segment::Field(name), Value::Object(map)) => map.get(name).map(|v| vec![v]),
        (Segment::Index(index), Value::Array(items)) => items.get(*index).map(|v| vec![v]),
        (Segment::Wildcard, Value::Array(items)) => Some(items.iter().collect()),
        _ => None,
    }
}

fn render<'a>(segments: impl Iterator<Item = &'a Segment>) -> String {
    segments.map(|s| s.to_string()).collect()
}

struct Parser<'a> {
    expression: &'a str,
    input: &'a str,
    pos: usize,
    /// Offset of `input` inside `expression`, for error reporting
    base: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        self.input.get(self.pos..).unwrap_or("")
    }

    fn error(&self, message: impl Into<String>) -> PathError {
        PathError::Parse {
            expression: self.expression.to_string(),
            offset: self.base + self.pos,
            message: message.into(),
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>, PathError> {
        let mut segments = Vec::new();

        // A bare leading field (`spec.x`) is accepted as well as `.spec.x`
        if !self.rest().is_empty() && !self.rest().starts_with(['.', '[']) {
            segments.push(Segment::Field(self.parse_field()?));
        }

        while let Some(c) = self.rest().chars().next() {
            match c {
                '.' => {
                    self.pos += 1;
                    segments.push(Segment::Field(self.parse_field()?));
                }
                '[' => {
                    self.pos += 1;
                    segments.push(self.parse_subscript()?);
                }
                other => return Err(self.error(format!("unexpected character '{}'", other))),
            }
        }

        if segments.is_empty() {
            return Err(self.error("path selects nothing"));
        }
        Ok(segments)
    }

    fn parse_field(&mut self) -> Result<String, PathError> {
        let rest = self.rest();
        let end = rest.find(['.', '[', ']']).unwrap_or(rest.len());
        let name = rest.get(..end).unwrap_or("");
        if name.is_empty() {
            return Err(self.error("empty field name"));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(self.error(format!("whitespace in field name '{}'", name)));
        }
        self.pos += end;
        Ok(name.to_string())
    }

    fn parse_subscript(&mut self) -> Result<Segment, PathError> {
        let rest = self.rest();

        if let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') {
            // A backslash escapes the next character (quote or backslash)
            let mut name = String::new();
            let mut escaped = false;
            let mut close = None;
            for (offset, c) in rest.char_indices().skip(1) {
                if escaped {
                    name.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    close = Some(offset);
                    break;
                } else {
                    name.push(c);
                }
            }
            let Some(close) = close else {
                return Err(self.error("unterminated quoted field name"));
            };
            if name.is_empty() {
                return Err(self.error("empty field name"));
            }
            // through the closing quote
            let consumed = close + 1;
            if !rest.get(consumed..).unwrap_or("").starts_with(']') {
                self.pos += consumed;
                return Err(self.error("expected ']' after quoted field name"));
            }
            self.pos += consumed + 1;
            return Ok(Segment::Field(name));
        }

        let Some(close) = rest.find(']') else {
            return Err(self.error("unterminated '['"));
        };
        let inner = rest.get(..close).unwrap_or("").trim();
        let segment = if inner == "*" {
            Segment::Wildcard
        } else if let Ok(index) = inner.parse::<usize>() {
            Segment::Index(index)
        } else {
            return Err(self.error(format!("unsupported subscript '[{}]'", inner)));
        };
        self.pos += close + 1;
        Ok(segment)
    }
}
