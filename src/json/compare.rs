//! Left-subset structural comparison of JSON trees.
//!
//! `compare(left, right)` succeeds when everything in `left` is recoverable
//! from `right`: sequences must match element-wise, every key of a `left`
//! mapping must be present in `right` with an equal value, and scalars must
//! be equal. Keys only present in `right` are ignored.
//!
//! Used to prove that a typed model round trip (parse, serialize, re-parse)
//! did not silently drop fields of the original document.

use std::fmt::{self, Write as _};

use serde_json::{Number, Value};

use super::write_key;

/// One step of the location of a divergence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Locator {
    Index(usize),
    Key(String),
}

/// The first point where `right` fails to reproduce `left`.
#[derive(Clone, Debug, PartialEq)]
pub struct Divergence {
    /// Path from the document root to the divergent value
    pub locator: Vec<Locator>,
    /// The value found in the left (reference) tree
    pub expected: Value,
    /// The value found in the right tree, `None` when absent
    pub actual: Option<Value>,
}

impl Divergence {
    /// Render the locator as a path expression (`.spec.containers[0].image`).
    pub fn path(&self) -> String {
        let mut out = String::new();
        for step in &self.locator {
            // Writing into a String cannot fail
            let _ = match step {
                Locator::Index(index) => write!(out, "[{}]", index),
                Locator::Key(key) => write_key(&mut out, key),
            };
        }
        if out.is_empty() {
            out.push('.');
        }
        out
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` expected {}, got ", self.path(), self.expected)?;
        match &self.actual {
            Some(actual) => write!(f, "{}", actual),
            None => write!(f, "nothing"),
        }
    }
}

impl std::error::Error for Divergence {}

/// Compare `left` against `right`, reporting the first divergence.
pub fn compare(left: &Value, right: &Value) -> Result<(), Divergence> {
    let mut locator = Vec::new();
    compare_at(&mut locator, left, Some(right))
}

fn compare_at(
    locator: &mut Vec<Locator>,
    left: &Value,
    right: Option<&Value>,
) -> Result<(), Divergence> {
    // An explicit null and an absent key carry the same information
    let right = match right {
        None | Some(Value::Null) if left.is_null() => return Ok(()),
        None | Some(Value::Null) => return Err(diverge(locator, left, None)),
        Some(right) => right,
    };

    match (left, right) {
        (Value::Array(l), Value::Array(r)) => {
            if l.len() != r.len() {
                return Err(diverge(locator, left, Some(right)));
            }
            for (index, (a, b)) in l.iter().zip(r).enumerate() {
                locator.push(Locator::Index(index));
                compare_at(locator, a, Some(b))?;
                locator.pop();
            }
            Ok(())
        }
        (Value::Object(l), Value::Object(r)) => {
            for (key, value) in l {
                locator.push(Locator::Key(key.clone()));
                compare_at(locator, value, r.get(key))?;
                locator.pop();
            }
            Ok(())
        }
        (Value::Number(a), Value::Number(b)) if numbers_equal(a, b) => Ok(()),
        (Value::String(a), Value::String(b)) if a == b => Ok(()),
        (Value::Bool(a), Value::Bool(b)) if a == b => Ok(()),
        _ => Err(diverge(locator, left, Some(right))),
    }
}

/// Integers compare exactly. An integer equals a float only when the float
/// is integral and converts to exactly that integer; two floats compare as
/// `f64`.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    match (integer(a), integer(b)) {
        (Some(x), Some(y)) => x == y,
        (Some(x), None) => float_equals_integer(b, x),
        (None, Some(y)) => float_equals_integer(a, y),
        (None, None) => matches!((a.as_f64(), b.as_f64()), (Some(x), Some(y)) if x == y),
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn float_equals_integer(float: &Number, int: i128) -> bool {
    // 2^64 bounds every i64 and u64
    const LIMIT: f64 = 18_446_744_073_709_551_616.0;
    match float.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < LIMIT => f as i128 == int,
        _ => false,
    }
}

fn diverge(locator: &[Locator], left: &Value, right: Option<&Value>) -> Divergence {
    Divergence {
        locator: locator.to_vec(),
        expected: left.clone(),
        actual: right.cloned(),
    }
}
