//! Otelbeat: an OpenTelemetry instrumentation harness.
//!
//! # Usage
//!
//! ```bash
//! otelbeat --endpoint http://localhost:4317 --iterations 1000 --interval-ms 10
//! ```
//!
//! Environment variables can also be used:
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint
//! - `OTEL_EXPORTER_OTLP_PROTOCOL`: `grpc` or `http/protobuf`
//! - `OTEL_TRACES_EXPORTER` / `OTEL_METRICS_EXPORTER`: `otlp` or `none`
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

use anyhow::Context as _;
use otelbeat::config::Config;
use otelbeat::harness::{self, HarnessConfig};
use otelbeat::observability::logging::init_logging;
use otelbeat::service::Service;
use otelbeat::telemetry::Telemetry;
use tokio::sync::watch;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  Otelbeat v{} - OpenTelemetry Instrumentation Harness

  Configuration:
    Endpoint:     {} ({:?})
    Exporters:    traces={:?} metrics={:?}
    Requests:     {} every {}ms, {} in flight
    Log Level:    {}

  Press Ctrl+C to stop early and flush.
"#,
        version,
        config.endpoint,
        config.protocol,
        config.traces_exporter,
        config.metrics_exporter,
        config.iterations,
        config.interval_ms,
        config.concurrency,
        config.log_level
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Install providers before anything can emit telemetry
    let telemetry = Telemetry::install(&config.telemetry())
        .context("failed to set up telemetry")?
        .with_drop_timeout(config.shutdown_timeout());

    // Initialize logging, bridged into the installed tracer
    init_logging(&config.log_level, Some(telemetry.tracer()))
        .context("failed to initialize logging")?;

    print_banner(&config);

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn signal handler task
    tokio::spawn(async move {
        // Wait for SIGTERM or SIGINT (Ctrl+C)
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    let _ = shutdown_tx.send(true);
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => {
                    tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating shutdown...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if ctrl_c.await.is_ok() {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
        }

        // Signal shutdown
        let _ = shutdown_tx.send(true);
    });

    // Run the request loop; it drains before returning
    let service = Service::new(telemetry.handle());
    let summary = harness::run(&service, HarnessConfig::from(&config), shutdown_rx).await;

    let (success, failed) = service.telemetry().totals();
    tracing::info!(success, failed, "Counters emitted");

    // Flush everything; a failure here is the only post-setup exit error
    telemetry
        .shutdown(config.shutdown_timeout())
        .await
        .context("failed to flush telemetry")?;

    tracing::info!(processed = summary.processed(), "Otelbeat shutdown complete");
    Ok(())
}
