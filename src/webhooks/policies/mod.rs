//! Validation policies for Configuration admission.
//!
//! Policies are organized as follows:
//! - Always enforced: the broker pod spec must declare containers
//! - Selectable checks, enabled through a [`ValidationProfile`]:
//!   - `required-shape`: every container declares non-empty `resources.limits`
//!   - `placeholder`: some container's limits carry the `{{PLACEHOLDER}}` key
//!   - `fidelity`: the typed model reproduces every field of the document

pub mod containers;
pub mod fidelity;
pub mod placeholder;
pub mod required_shape;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use crate::crd::Configuration;

/// Result of a validation check
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Reason for denial (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    /// Create a denied result
    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// Context for validation
pub struct ValidationContext<'a> {
    /// The candidate object as submitted
    pub object: &'a Value,
    /// The typed form, present when an enabled check needs it
    pub configuration: Option<&'a Configuration>,
    /// Whether `resources.requests` is held to the same rules as limits
    pub strict_requests: bool,
}

/// A selectable validation check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Check {
    RequiredShape,
    Placeholder,
    Fidelity,
}

impl Check {
    pub const ALL: [Check; 3] = [Check::RequiredShape, Check::Placeholder, Check::Fidelity];

    pub fn as_str(&self) -> &'static str {
        match self {
            Check::RequiredShape => "required-shape",
            Check::Placeholder => "placeholder",
            Check::Fidelity => "fidelity",
        }
    }

    /// Whether the check operates on the typed form
    pub fn needs_typed_form(&self) -> bool {
        matches!(self, Check::RequiredShape | Check::Fidelity)
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown check name
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("unknown check `{0}` (expected one of: required-shape, placeholder, fidelity)")]
pub struct UnknownCheck(pub String);

impl FromStr for Check {
    type Err = UnknownCheck;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Check::ALL
            .into_iter()
            .find(|check| check.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownCheck(name.to_string()))
    }
}

/// Which checks run, in which order.
///
/// Checks run in the order given; a check listed twice runs once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationProfile {
    checks: Vec<Check>,
    strict_requests: bool,
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self::new([Check::Placeholder])
    }
}

impl ValidationProfile {
    pub fn new(checks: impl IntoIterator<Item = Check>) -> Self {
        let mut ordered: Vec<Check> = Vec::new();
        for check in checks {
            if !ordered.contains(&check) {
                ordered.push(check);
            }
        }
        Self {
            checks: ordered,
            strict_requests: false,
        }
    }

    /// Also require non-empty `resources.requests` in the required-shape check
    pub fn with_strict_requests(mut self, strict_requests: bool) -> Self {
        self.strict_requests = strict_requests;
        self
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn strict_requests(&self) -> bool {
        self.strict_requests
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Whether any enabled check needs the typed form
    pub fn needs_typed_form(&self) -> bool {
        self.checks.iter().any(Check::needs_typed_form)
    }
}
