//! # UVN Telemetry
//!
//! Structured logging and Prometheus metrics shared by every `uvn-*`
//! crate: a `tracing`-based log pipeline, a `prometheus` metrics
//! registry, and a small [`Context`] type that tags every span emitted by
//! an agent or registry process with its `uvn_name`/`cell_id`.
//!
//! No OTLP/dashboard exporter is wired up here; the dashboard and any
//! cloud-export plugin are external collaborators, reached only through
//! the Prometheus text endpoint this crate exposes via [`encode_metrics`].
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `UVN_SERVICE_NAME` | `uvn-agent` | Service name attached to every log line |
//! | `UVN_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `UVN_CONSOLE_OUTPUT` | `true` | Enable console output |
//! | `UVN_JSON_LOGS` | `false` (container-detected) | Emit JSON logs |
//! | `UVN_METRICS_PORT` | `9100` | Prometheus `/metrics` port |
//! | `DEBUG` | unset | Enables verbose command tracing (§6) |

#![warn(missing_docs)]
#![allow(missing_docs)] // TODO: document remaining public items per-crate as they stabilize

mod config;
mod context;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use context::Context;
pub use logging::StructuredLogger;
pub use metrics::{encode_metrics, register_metrics, MetricsHandle};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to initialize tracing subscriber: {0}")]
    TracerInit(String),
    #[error("failed to initialize structured logging: {0}")]
    LokiInit(String),
    #[error("failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
    #[error("invalid telemetry configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics for the current process.
///
/// Returns a guard that must be held for the lifetime of the application;
/// dropping it is a no-op today (no exporter needs draining) but keeps the
/// call site shaped like one that does.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(&config)?;
    let _logging_guard = logging::init_logging(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active. Drop to release it.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("shutting down telemetry");
    }
}

/// Creates a span carrying a `component` field, matching the call sites
/// every `uvn-*` crate uses so subsystem names stay consistent in logs.
#[macro_export]
macro_rules! subsystem_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_service_name() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "uvn-agent");
    }
}
