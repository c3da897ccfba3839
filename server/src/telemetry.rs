//! Logging and metrics setup for the server binary.

use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors from telemetry setup.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log filter directive is invalid
    #[error("Invalid log filter: {0}")]
    Filter(String),
    /// A global subscriber or recorder is already installed
    #[error("Failed to install {what}: {reason}")]
    Install {
        /// What was being installed
        what: &'static str,
        /// Underlying error
        reason: String,
    },
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` directives win over `default_filter`.
///
/// # Errors
///
/// Returns [`TelemetryError`] if the filter is invalid or a subscriber is
/// already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("{default_filter},sqlx=warn"))
            .map_err(|e| TelemetryError::Filter(e.to_string()))?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| TelemetryError::Install {
            what: "tracing subscriber",
            reason: e.to_string(),
        })
}

/// Install the Prometheus recorder and describe the roster metrics.
///
/// # Errors
///
/// Returns [`TelemetryError`] if a recorder is already installed.
pub fn install_metrics() -> Result<PrometheusHandle, TelemetryError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::Install {
            what: "metrics recorder",
            reason: e.to_string(),
        })?;
    roster_core::metrics::describe();
    Ok(handle)
}

/// Router serving `GET /metrics` in Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || async move { handle.render() }))
}
