//! Structured log field macros.
//!
//! Logs are plain `tracing` events; the fields below keep call sites
//! consistent across the 12 `uvn-*` crates instead of each one inventing
//! its own key names.

use crate::{TelemetryConfig, TelemetryError};

/// Logging handle. Exists so `init_telemetry` has something to hold
/// alongside the metrics and tracing guards.
pub struct StructuredLogger {
    _initialized: bool,
}

pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    tracing::debug!(
        json_logs = config.json_logs,
        service = %config.service_name,
        "structured logging configured"
    );

    Ok(StructuredLogger { _initialized: true })
}

/// Log an event with a consistent `component` field.
#[macro_export]
macro_rules! log_event {
    (info, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(component = $component, $($($field)*,)? $msg)
    };
    (warn, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(component = $component, $($($field)*,)? $msg)
    };
    (error, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(component = $component, $($($field)*,)? $msg)
    };
    (debug, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(component = $component, $($($field)*,)? $msg)
    };
}

/// Log a peer-related event with a standard `peer` field.
#[macro_export]
macro_rules! log_peer_event {
    ($level:ident, $component:expr, $msg:expr, $peer:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            peer = %$peer,
            $($($field)*,)?
            $msg
        )
    };
}
