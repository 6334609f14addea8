//! Admission decision for a single candidate Configuration.
//!
//! The validator keeps two views of the candidate object: the untyped
//! `serde_json::Value` (ground truth, nothing dropped) and the typed
//! [`Configuration`] (only built when an enabled check needs it). Every
//! failure path produces a denying [`Verdict`]; nothing escapes as an error.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::crd::{Configuration, normalize_quantities};
use crate::json::{PathError, PathQuery};
use crate::webhooks::policies::{
    Check, ValidationContext, ValidationProfile, ValidationResult, containers, fidelity,
    placeholder, required_shape,
};

/// Denial message for an admission request without an object
pub const NO_DATA_MESSAGE: &str = "AdmissionReview Request Object contains no data";

/// Outcome of validating one candidate object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    uid: String,
    allowed: bool,
    reason: Option<String>,
    code: Option<String>,
}

impl Verdict {
    /// Create an allowing verdict
    pub fn allowed(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: true,
            reason: None,
            code: None,
        }
    }

    /// Create a denying verdict with a machine-readable code and a
    /// human-readable reason
    pub fn denied(uid: &str, code: &str, reason: &str) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: false,
            reason: Some(reason.to_string()),
            code: Some(code.to_string()),
        }
    }

    fn from_result(uid: &str, result: ValidationResult) -> Self {
        if result.allowed {
            return Self::allowed(uid);
        }
        let code = result
            .reason
            .unwrap_or_else(|| "ValidationFailed".to_string());
        let reason = result
            .message
            .unwrap_or_else(|| "Validation failed".to_string());
        Self::denied(uid, &code, &reason)
    }

    /// Correlation id copied from the admission request
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// Human-readable denial reason, `None` when allowed
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Machine-readable denial code (e.g. `MissingPlaceholder`)
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Validates candidate Configuration objects against a profile.
///
/// Built once at startup; holds the compiled path queries and is shared
/// read-only by every request.
#[derive(Clone, Debug)]
pub struct Validator {
    profile: ValidationProfile,
    containers: PathQuery,
    limits: PathQuery,
}

impl Validator {
    pub fn new(profile: ValidationProfile) -> Result<Self, PathError> {
        Ok(Self {
            profile,
            containers: PathQuery::compile(containers::CONTAINERS_PATH)?,
            limits: PathQuery::compile(placeholder::LIMITS_PATH)?,
        })
    }

    pub fn profile(&self) -> &ValidationProfile {
        &self.profile
    }

    /// Decide whether `raw` may be admitted.
    ///
    /// Checks short-circuit on the first denial:
    /// 1. the object is non-empty
    /// 2. the object is valid JSON
    /// 3. the broker pod spec declares containers
    /// 4. the object deserializes into the typed form (only when needed,
    ///    after numeric quantities are rewritten as strings)
    /// 5. each enabled check, in profile order
    pub fn validate(&self, raw: &[u8], uid: &str) -> Verdict {
        if raw.is_empty() {
            debug!(uid = %uid, "Request object contains no data");
            return Verdict::denied(uid, "EmptyObject", NO_DATA_MESSAGE);
        }

        let mut object: Value = match serde_json::from_slice(raw) {
            Ok(v) => v,
            Err(e) => {
                debug!(uid = %uid, error = %e, "Unable to parse request object");
                return Verdict::denied(uid, "InvalidJson", &e.to_string());
            }
        };

        let strict_requests = self.profile.strict_requests();
        let untyped = ValidationContext {
            object: &object,
            configuration: None,
            strict_requests,
        };

        let result = containers::validate(&untyped, &self.containers);
        if !result.allowed {
            return Verdict::from_result(uid, result);
        }

        let configuration: Option<Configuration> = if self.profile.needs_typed_form() {
            // Fidelity compares against the normalized document too
            normalize_quantities(&mut object);
            match Configuration::deserialize(&object) {
                Ok(c) => Some(c),
                Err(e) => {
                    debug!(uid = %uid, error = %e, "Unable to read typed Configuration");
                    return Verdict::denied(
                        uid,
                        "InvalidConfiguration",
                        &format!("Unable to unmarshal akri.sh/v0/Configuration: {}", e),
                    );
                }
            }
        } else {
            None
        };
        let ctx = ValidationContext {
            object: &object,
            configuration: configuration.as_ref(),
            strict_requests,
        };

        for check in self.profile.checks() {
            let result = match check {
                Check::RequiredShape => required_shape::validate(&ctx),
                Check::Placeholder => placeholder::validate(&ctx, &self.limits),
                Check::Fidelity => fidelity::validate(&ctx),
            };
            if !result.allowed {
                debug!(uid = %uid, check = %check, "Check denied request object");
                return Verdict::from_result(uid, result);
            }
        }

        Verdict::allowed(uid)
    }
}
