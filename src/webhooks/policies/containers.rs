//! Broker container presence policy.
//!
//! Always enforced, regardless of profile: a Configuration without broker
//! containers has nothing to schedule against a device.

use super::{ValidationContext, ValidationResult};
use crate::json::PathQuery;

/// Selects every broker container
pub const CONTAINERS_PATH: &str = "{.spec.brokerPodSpec.containers[*]}";

/// Validate that the broker pod spec declares at least one container
pub fn validate(ctx: &ValidationContext<'_>, containers: &PathQuery) -> ValidationResult {
    match containers.evaluate(ctx.object, true) {
        Ok(matches) if !matches.is_empty() => ValidationResult::allowed(),
        Ok(_) => ValidationResult::denied("NoContainers", "Configuration has no containers"),
        Err(e) => ValidationResult::denied("InvalidPath", &e.to_string()),
    }
}
