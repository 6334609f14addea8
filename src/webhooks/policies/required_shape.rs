//! Broker container resources policy.
//!
//! Enabled by the `required-shape` check.
//!
//! Validates, on the typed form:
//! - The broker pod spec declares at least one container
//! - Every container declares a non-empty `resources.limits` map
//! - No limits key is the empty string
//! - With strict requests, the same rules for `resources.requests`

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use super::{ValidationContext, ValidationResult};

/// Validate broker container resources
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

    let containers = configuration.containers();
    if containers.is_empty() {
        return ValidationResult::denied("NoContainers", "Configuration has no containers");
    }

    for container in containers {
        let resources = container.resources.as_ref();

        let result = validate_quantities(
            &container.name,
            "limits",
            resources.and_then(|r| r.limits.as_ref()),
        );
        if !result.allowed {
            return result;
        }

        if ctx.strict_requests {
            let result = validate_quantities(
                &container.name,
                "requests",
                resources.and_then(|r| r.requests.as_ref()),
            );
            if !result.allowed {
                return result;
            }
        }
    }

    ValidationResult::allowed()
}

fn validate_quantities(
    container: &str,
    field: &str,
    quantities: Option<&BTreeMap<String, Quantity>>,
) -> ValidationResult {
    let quantities = match quantities {
        Some(q) if !q.is_empty() => q,
        _ => {
            let reason = match field {
                "requests" => "MissingResourceRequests",
                _ => "MissingResourceLimits",
            };
            return ValidationResult::denied(
                reason,
                &format!(
                    "Container [{}] has no `resources.{}` in Configuration",
                    container, field
                ),
            );
        }
    };

    if quantities.contains_key("") {
        return ValidationResult::denied(
            "EmptyResourceKey",
            &format!(
                "Expect key in `spec.containers[\"{}\"].resources.{}`",
                container, field
            ),
        );
    }

    ValidationResult::allowed()
}
