//! Logging and metrics initialization.
//!
//! [`init`] is called once by the binary. It installs the global `tracing`
//! subscriber and, when enabled, the Prometheus recorder behind the
//! `metrics` facade. The returned [`Telemetry`] handle is passed explicitly
//! to whatever needs to render metrics.

use crate::{KeelError, KeelResult};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub log_level: String,
    pub log_format: LogFormat,
    /// Whether to install the Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

/// Handle to the installed telemetry.
#[derive(Clone, Default)]
pub struct Telemetry {
    prometheus: Option<PrometheusHandle>,
}

impl Telemetry {
    /// A handle with no recorder installed.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Wraps an already installed Prometheus recorder.
    #[must_use]
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self {
            prometheus: Some(handle),
        }
    }

    /// Returns the Prometheus handle if metrics are enabled.
    #[must_use]
    pub fn prometheus(&self) -> Option<&PrometheusHandle> {
        self.prometheus.as_ref()
    }

    /// Renders the current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.prometheus.as_ref().map(PrometheusHandle::render)
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("metrics_enabled", &self.prometheus.is_some())
            .finish()
    }
}

/// Installs the global subscriber and metrics recorder.
///
/// # Errors
///
/// Returns a configuration error if a global subscriber or recorder is
/// already installed, or if the filter directive does not parse.
pub fn init(config: &TelemetryConfig) -> KeelResult<Telemetry> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            KeelError::Configuration(format!("invalid log level '{}': {e}", config.log_level))
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init(),
    };
    installed.map_err(|e| KeelError::Configuration(format!("failed to install subscriber: {e}")))?;

    if !config.metrics_enabled {
        tracing::info!(log_format = ?config.log_format, "Telemetry initialized, metrics disabled");
        return Ok(Telemetry::disabled());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), LATENCY_BUCKETS)
        .map_err(|e| KeelError::Configuration(format!("invalid histogram buckets: {e}")))?
        .install_recorder()
        .map_err(|e| KeelError::Configuration(format!("failed to install metrics recorder: {e}")))?;

    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        let upkeep = handle.clone();
        runtime.spawn(async move {
            let mut interval = tokio::time::interval(UPKEEP_INTERVAL);
            loop {
                interval.tick().await;
                upkeep.run_upkeep();
            }
        });
    }

    tracing::info!(log_format = ?config.log_format, "Telemetry initialized");

    Ok(Telemetry::from_handle(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_log_format_deserializes_lowercase() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert!(serde_json::from_str::<LogFormat>("\"xml\"").is_err());
    }

    #[test]
    fn test_disabled_handle_renders_nothing() {
        let telemetry = Telemetry::disabled();
        assert!(telemetry.prometheus().is_none());
        assert!(telemetry.render().is_none());
    }
}
