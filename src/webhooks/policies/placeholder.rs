//! Capacity placeholder policy.
//!
//! Enabled by the `placeholder` check.
//!
//! The Akri agent rewrites the `{{PLACEHOLDER}}` limits key into a device
//! capacity slot when it schedules a broker. At least one container must
//! carry it; which one does not matter.

use tracing::debug;

use super::{ValidationContext, ValidationResult};
use crate::crd::PLACEHOLDER;
use crate::json::PathQuery;

/// Selects the `resources.limits` map of every broker container
pub const LIMITS_PATH: &str = "{.spec.brokerPodSpec.containers[*].resources.limits}";

/// Validate that some container's limits carry the placeholder key
pub fn validate(ctx: &ValidationContext<'_>, limits: &PathQuery) -> ValidationResult {
    let matches = match limits.evaluate(ctx.object, true) {
        Ok(m) => m,
        Err(e) => return ValidationResult::denied("InvalidPath", &e.to_string()),
    };

    let keys: Vec<&str> = matches
        .iter()
        .filter_map(|limits| limits.as_object())
        .flat_map(|limits| limits.keys().map(String::as_str))
        .collect();
    debug!(path = %limits, keys = ?keys, "Collected container limits keys");

    if keys.contains(&PLACEHOLDER) {
        return ValidationResult::allowed();
    }

    ValidationResult::denied(
        "MissingPlaceholder",
        &format!(
            "Configuration does not include `{}[{}]`",
            limits.expression(),
            PLACEHOLDER
        ),
    )
}
