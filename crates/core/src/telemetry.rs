// Telemetry setup
//
// Console logging through tracing-subscriber with an EnvFilter.
// Configure via environment variables:
// - RUST_LOG / LOG_LEVEL: log filter (falls back to the binary's default)
// - LOG_FORMAT: "pretty" (default) or "compact"

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name, recorded in the startup log line
    pub service_name: String,
    /// Service version
    pub service_version: Option<String>,
    /// Log filter (e.g., "info", "locust_dashboard_control_plane=debug")
    pub log_filter: Option<String>,
    /// Use the compact single-line formatter
    pub compact: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "locust-dashboard".to_string(),
            service_version: None,
            log_filter: None,
            compact: false,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            service_name: std::env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "locust-dashboard".to_string()),
            service_version: None,
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok())
                .filter(|s| !s.is_empty()),
            compact: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("compact"))
                .unwrap_or(false),
        }
    }

    /// Resolve the filter, falling back to `info` when none or an invalid one is set
    pub fn env_filter(&self) -> EnvFilter {
        self.log_filter
            .as_ref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_telemetry(config: TelemetryConfig) {
    let filter = config.env_filter();

    let console_layer = if config.compact {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_filter(filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(filter)
            .boxed()
    };

    if tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
        return;
    }

    tracing::info!(
        service = %config.service_name,
        version = config.service_version.as_deref().unwrap_or("unknown"),
        "Telemetry initialized"
    );
}
