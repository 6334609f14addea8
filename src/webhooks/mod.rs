//! Webhook module for validating Configuration admission requests.
//!
//! - `admission`: AdmissionReview envelope decoding/encoding
//! - `validator`: the allow/deny decision for one candidate object
//! - `policies`: the individual checks a validation profile selects from
//! - `server`: the HTTPS endpoint wiring it together

pub mod admission;
pub mod policies;
mod server;
pub mod validator;

pub use admission::{AdmissionError, ReviewRequest, decode_request, encode_response};
pub use policies::{Check, UnknownCheck, ValidationContext, ValidationProfile, ValidationResult};
pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, WebhookState,
    create_webhook_router, run_webhook_server,
};
pub use validator::{Validator, Verdict};
