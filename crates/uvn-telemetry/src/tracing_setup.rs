//! `tracing-subscriber` setup.
//!
//! No OpenTelemetry exporter is wired up; dashboards and trace collection
//! are an external-tooling concern outside this crate's scope. Every
//! `uvn-*` crate uses the `tracing` facade uniformly, and this is the one
//! place the agent and registry processes install a subscriber for it.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

/// Guard returned by [`init_tracing`]. Dropping it is a no-op; it exists
/// so callers have a value to hold for the lifetime of the process,
/// matching the shape of a real exporter guard.
pub struct TracingGuard {
    _private: (),
}

pub fn init_tracing(config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(config.console_output.then_some(json_layer))
            .try_init()
            .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(config.console_output.then_some(fmt_layer))
            .try_init()
            .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;
    }

    tracing::info!(service = %config.service_name, "tracing initialized");

    Ok(TracingGuard { _private: () })
}

#[cfg(test)]
mod tests {
    // Installing a global subscriber from unit tests would race with every
    // other test in the binary; covered by the agent's own integration tests.
}
