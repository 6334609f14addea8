//! akri-admission-webhook library crate
//!
//! Validating admission webhook for `akri.sh/v0` Configuration resources.
//! The API server calls `/validate` before persisting a Configuration; the
//! webhook answers allow or deny. It never mutates objects and keeps no
//! state between requests.

pub mod config;
pub mod crd;
pub mod health;
pub mod json;
pub mod webhooks;

pub use config::{Config, ConfigError, LogFormat};
pub use health::HealthState;
pub use webhooks::{
    Check, ValidationProfile, Validator, Verdict, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH,
    WEBHOOK_PORT, WebhookError, WebhookState, run_webhook_server,
};
