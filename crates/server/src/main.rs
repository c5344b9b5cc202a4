use anyhow::Result;
use explorer_core::{config::AppConfig, metrics::install_prometheus_exporter, runtime::ExplorerRuntime};
use std::time::Duration;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Initializes the logging system based on the configuration.
///
/// `RUST_LOG` overrides the configured level.
fn init_logging(config: &AppConfig) {
    let level = config.logging.level.as_str();
    let filter = if let Ok(env_filter) = std::env::var("RUST_LOG") {
        if env_filter == "debug" || env_filter == "trace" {
            EnvFilter::new(format!("warn,explorer_core={env_filter},server={env_filter}"))
        } else {
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
                EnvFilter::new("warn,explorer_core=debug,server=debug")
            })
        }
    } else {
        EnvFilter::new(format!("warn,explorer_core={level},server={level}"))
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json();
        registry.with(fmt_layer).init();
    } else {
        // "pretty" and any other format default to pretty logging
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config =
        AppConfig::load().map_err(|e| anyhow::anyhow!("Configuration loading failed: {e}"))?;

    init_logging(&config);
    info!("Starting block explorer sync engine");
    debug!(
        mode = config.explorer.mode.as_str(),
        node = %config.node.url,
        metrics_enabled = config.metrics.enabled,
        "Configuration loaded"
    );

    if config.metrics.enabled {
        install_prometheus_exporter(config.metrics.prometheus_port)
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {e}"))?;
    }

    let mut runtime = ExplorerRuntime::builder()
        .with_config(config)
        .build()
        .await
        .map_err(|e| anyhow::anyhow!("Runtime initialization failed: {e}"))?;
    runtime.start();

    shutdown_signal().await;

    if tokio::time::timeout(
        Duration::from_secs(GRACEFUL_SHUTDOWN_TIMEOUT_SECS),
        runtime.shutdown(),
    )
    .await
    .is_err()
    {
        warn!("Graceful shutdown timed out, exiting");
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(
                error = %e,
                "Failed to install Ctrl+C handler"
            );
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(
                    error = %e,
                    "Failed to install signal handler"
                );

                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(
        "Shutdown signal received, starting graceful shutdown (timeout: {}s)",
        GRACEFUL_SHUTDOWN_TIMEOUT_SECS
    );
}
