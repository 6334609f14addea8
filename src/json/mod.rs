//! Helpers for working with untyped JSON documents.
//!
//! - `path`: compiled field-path queries (`.a.b[*].c`) over `serde_json::Value`
//! - `compare`: left-subset structural comparison of two JSON trees

pub mod compare;
pub mod path;

pub use compare::{Divergence, Locator, compare};
pub use path::{PathError, PathQuery, Segment};

use std::fmt;

/// Write `key` as a path step.
///
/// Identifier-like keys render as `.key`; anything else (dots, slashes,
/// braces, quotes) renders as a quoted subscript, with the quote character
/// and backslashes escaped by a backslash, so the output can be fed back
/// into [`PathQuery::compile`]. The empty key renders as `['']`, which
/// `compile` rejects.
pub(crate) fn write_key<W: fmt::Write>(out: &mut W, key: &str) -> fmt::Result {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        write!(out, ".{}", key)
    } else {
        let quote = if key.contains('\'') && !key.contains('"') {
            '"'
        } else {
            '\''
        };
        out.write_char('[')?;
        out.write_char(quote)?;
        for c in key.chars() {
            if c == quote || c == '\\' {
                out.write_char('\\')?;
            }
            out.write_char(c)?;
        }
        out.write_char(quote)?;
        out.write_char(']')
    }
}
