//! akri-admission-webhook - validating admission webhook for Akri Configurations.
//!
//! This is the main entry point that:
//! - Parses flags (or their environment variables)
//! - Initializes structured logging
//! - Starts the health server and the TLS webhook server

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use akri_admission_webhook::health::{HealthState, run_health_server};
use akri_admission_webhook::{Config, LogFormat, Validator, WebhookState, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // Initialize tracing subscriber
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("akri_admission_webhook=info".parse()?);
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    info!("Starting akri-admission-webhook");

    // Only one rustls provider may be active per process
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        info!("rustls crypto provider already installed");
    }

    let profile = config.profile()?;
    info!(
        checks = ?profile.checks(),
        strict_requests = profile.strict_requests(),
        "Validation profile"
    );
    let validator = Validator::new(profile)?;

    for path in [&config.tls_crt_file, &config.tls_key_file] {
        if !Path::new(path).exists() {
            error!(path = %path, "Webhook TLS file not found");
            return Err(format!("TLS file not found: {}", path).into());
        }
    }

    let health_state = Arc::new(HealthState::new());

    // Start health server immediately (liveness must answer during startup)
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = {
        let state = Arc::new(WebhookState::new(validator, health_state.clone()));
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(
                state,
                &config.tls_crt_file,
                &config.tls_key_file,
                config.port,
            )
            .await
            {
                error!("Webhook server error: {}", e);
            }
        })
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, shutting down");
            health_state.set_ready(false).await;
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
