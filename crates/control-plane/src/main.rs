// Locust dashboard API server
// Decision: Configuration is read once at startup; a bad value aborts before the port is bound
// Decision: On Ctrl-C/SIGTERM the HTTP server drains first, then the live worker is stopped

use anyhow::{Context, Result};
use locust_dashboard_control_plane::app::{build_router, Services};
use locust_dashboard_control_plane::config::{CorsOrigins, ServerConfig};
use locust_dashboard_core::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Configure via environment variables:
    // - RUST_LOG: Log filter (default: "locust_dashboard_control_plane=debug,tower_http=debug")
    // - LOG_FORMAT: "compact" for single-line output
    let mut telemetry_config = TelemetryConfig::from_env();
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter =
            Some("info,locust_dashboard_control_plane=debug,tower_http=debug".to_string());
    }
    telemetry_config.service_version = Some(env!("CARGO_PKG_VERSION").to_string());
    init_telemetry(telemetry_config);

    tracing::info!("locust-dashboard starting...");

    let config = ServerConfig::from_env().context("Invalid configuration")?;

    tracing::info!(mode = %config.auth.mode, "Authentication configured");
    tracing::info!(
        program = %config.worker.program,
        locustfile = ?config.worker.locustfile,
        metrics_url = ?config.worker.metrics_url,
        stop_grace_secs = config.supervisor.stop_grace.as_secs(),
        "Worker command configured"
    );
    match &config.cors_origins {
        CorsOrigins::Disabled => tracing::info!("CORS not configured (same-origin requests only)"),
        CorsOrigins::Any => tracing::warn!("CORS allows any origin"),
        CorsOrigins::List(origins) => tracing::info!(origins = ?origins, "CORS origins configured"),
    }

    let services = Services::from_config(&config);
    let app = build_router(&services, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    tracing::info!("HTTP server listening on {}", config.bind_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    services.supervisor.shutdown().await;
    tracing::info!("Server shutdown complete");

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
