//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for structured logging and the metrics endpoint.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line (`uvn-agent`, `uvn-registry`, ...).
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Whether to enable console output (for development).
    pub console_output: bool,

    /// Whether to emit JSON-formatted logs instead of the pretty console format.
    pub json_logs: bool,

    /// Port the Prometheus `/metrics` endpoint listens on.
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "uvn-agent".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_port: 9100,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `UVN_SERVICE_NAME`: Service name (default: uvn-agent)
    /// - `UVN_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `UVN_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `UVN_JSON_LOGS`: Enable JSON logs (default: false outside containers)
    /// - `UVN_METRICS_PORT`: Prometheus metrics port (default: 9100)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("UVN_SERVICE_NAME").unwrap_or_else(|_| "uvn-agent".to_string()),

            log_level: env::var("UVN_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("UVN_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("UVN_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            metrics_port: env::var("UVN_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9100),
        }
    }

    /// Create configuration for a named service (e.g. `"uvn-registry"`).
    pub fn for_service(service_name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = service_name.to_string();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "uvn-agent");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.metrics_port, 9100);
    }

    #[test]
    fn for_service_overrides_name_only() {
        let config = TelemetryConfig::for_service("uvn-registry");
        assert_eq!(config.service_name, "uvn-registry");
    }
}
