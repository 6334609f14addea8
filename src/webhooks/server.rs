//! Admission webhook server.
//!
//! Provides the `/validate` endpoint the API server calls before persisting
//! a Configuration.
//!
//! To enable the webhook:
//! 1. Issue a serving certificate (e.g. with cert-manager)
//! 2. Mount the TLS secret into the webhook pod at /etc/webhook/certs/
//! 3. Create a ValidatingWebhookConfiguration for `akri.sh/v0` `configurations`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tracing::{debug, error, info, warn};

use crate::health::HealthState;
use crate::webhooks::admission;
use crate::webhooks::validator::Validator;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub validator: Validator,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(validator: Validator, health: Arc<HealthState>) -> Self {
        Self { validator, health }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate", post(validate_configuration))
        .with_state(state)
}

/// Whether the request declares a JSON body (parameters such as charset allowed)
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
}

/// Validate a Configuration admission webhook handler
async fn validate_configuration(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_json(&headers) {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        error!(
            content_type = %content_type,
            "Unexpected Content-Type, expect application/json"
        );
        state
            .health
            .metrics
            .record_transport_error(StatusCode::BAD_REQUEST.as_u16());
        return StatusCode::BAD_REQUEST.into_response();
    }

    let request = match admission::decode_request(&body) {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            state
                .health
                .metrics
                .record_transport_error(StatusCode::BAD_REQUEST.as_u16());
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let uid = request.uid.as_str();
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );

    let started = Instant::now();
    let verdict = state.validator.validate(&request.object, uid);
    state.health.metrics.record_admission(
        verdict.is_allowed(),
        verdict.code(),
        started.elapsed().as_secs_f64(),
    );

    if verdict.is_allowed() {
        info!(uid = %uid, "Admission request allowed");
    } else {
        warn!(
            uid = %uid,
            code = verdict.code().unwrap_or_default(),
            reason = verdict.reason().unwrap_or_default(),
            "Admission request denied"
        );
    }

    match admission::encode_versioned_response(&verdict, &request.api_version) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(uid = %uid, error = %e, "Unable to marshal response");
            state
                .health
                .metrics
                .record_transport_error(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Errors that can occur when running the webhook server
#[derive(Debug)]
pub enum WebhookError {
    /// TLS configuration error
    TlsConfig(String),
    /// Server error
    Server(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::TlsConfig(msg) => write!(f, "TLS configuration error: {}", msg),
            WebhookError::Server(msg) => write!(f, "Webhook server error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on `port` and serves the /validate endpoint.
///
/// # Arguments
/// * `state` - Validator and health state shared by all requests
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
/// * `port` - Listening port
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    cert_path: &str,
    key_path: &str,
    port: u16,
) -> Result<(), WebhookError> {
    let health = state.health.clone();
    let app = create_webhook_router(state);

    info!(cert = %cert_path, key = %key_path, "Loading webhook key pair");
    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let handle = Handle::new();
    let readiness = tokio::spawn(mark_ready_when_listening(handle.clone(), health.clone()));

    let result = axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()));

    readiness.abort();
    health.set_ready(false).await;
    result
}

/// Flip readiness once the listener behind `handle` is bound
async fn mark_ready_when_listening(handle: Handle, health: Arc<HealthState>) {
    if let Some(addr) = handle.listening().await {
        info!(addr = %addr, "Webhook server listening with TLS");
        health.set_ready(true).await;
    }
}
