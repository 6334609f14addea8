//! Process configuration.
//!
//! Every flag can also be supplied through an environment variable so the
//! webhook can be configured from a Deployment manifest alone. The parsed
//! [`Config`] is built once in `main` and handed down explicitly.

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::webhooks::{
    Check, ValidationProfile, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
};

/// Default health/metrics server port
pub const HEALTH_PORT: u16 = 8080;

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines
    Text,
}

/// Validating admission webhook for akri.sh/v0 Configuration resources
#[derive(Parser, Debug, Clone)]
#[command(name = "akri-admission-webhook")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// TLS certificate file (PEM)
    #[arg(long, env = "WEBHOOK_TLS_CRT_FILE", default_value = WEBHOOK_CERT_PATH)]
    pub tls_crt_file: String,

    /// TLS private key file (PEM)
    #[arg(long, env = "WEBHOOK_TLS_KEY_FILE", default_value = WEBHOOK_KEY_PATH)]
    pub tls_key_file: String,

    /// Webhook port
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = WEBHOOK_PORT)]
    pub port: u16,

    /// Health and metrics port
    #[arg(long, env = "WEBHOOK_HEALTH_PORT", default_value_t = HEALTH_PORT)]
    pub health_port: u16,

    /// Checks to run, in order (required-shape, placeholder, fidelity)
    #[arg(
        long,
        env = "WEBHOOK_CHECKS",
        value_delimiter = ',',
        default_value = "placeholder"
    )]
    pub checks: Vec<Check>,

    /// Also require non-empty `resources.requests` in the required-shape check
    #[arg(long, env = "WEBHOOK_STRICT_REQUESTS")]
    pub strict_requests: bool,

    /// Log output format
    #[arg(long, env = "WEBHOOK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

/// Errors in an otherwise well-formed configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one check must be enabled")]
    NoChecks,

    #[error("--strict-requests requires the required-shape check")]
    StrictRequestsWithoutRequiredShape,
}

impl Config {
    /// Build the validation profile selected by the flags
    pub fn profile(&self) -> Result<ValidationProfile, ConfigError> {
        if self.checks.is_empty() {
            return Err(ConfigError::NoChecks);
        }
        if self.strict_requests && !self.checks.contains(&Check::RequiredShape) {
            return Err(ConfigError::StrictRequestsWithoutRequiredShape);
        }
        Ok(ValidationProfile::new(self.checks.iter().copied())
            .with_strict_requests(self.strict_requests))
    }
}
