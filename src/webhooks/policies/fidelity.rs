//! Typed model fidelity policy.
//!
//! Enabled by the `fidelity` check.
//!
//! The typed form is serialized and re-parsed, then compared against the
//! submitted document. Any field of the document the round trip cannot
//! reproduce denies admission: either the object is malformed or the model
//! no longer covers what clients send.

use serde_json::Value;

use super::{ValidationContext, ValidationResult};
use crate::json::compare;

/// Validate that the typed form reproduces the submitted document
pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let configuration = match ctx.configuration {
        Some(c) => c,
        None => {
            return ValidationResult::denied(
                "InvalidConfiguration",
                "Configuration could not be read as akri.sh/v0/Configuration",
            );
        }
    };

    let bytes = match serde_json::to_vec(configuration) {
        Ok(b) => b,
        Err(e) => {
            return ValidationResult::denied(
                "SerializationFailed",
                &format!("Unable to serialize Configuration: {}", e),
            );
        }
    };

    let reparsed: Value = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            return ValidationResult::denied(
                "SerializationFailed",
                &format!("Unable to re-parse serialized Configuration: {}", e),
            );
        }
    };

    match compare(ctx.object, &reparsed) {
        Ok(()) => ValidationResult::allowed(),
        Err(divergence) => ValidationResult::denied(
            "SchemaDivergence",
            &format!("Configuration is not fully modeled: {}", divergence),
        ),
    }
}
