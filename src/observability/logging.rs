//! Structured logging setup.
//!
//! Configures:
//! - Console logging with structured format
//! - A filter from the configured level (RUST_LOG syntax)
//! - Optionally, a bridge exporting this crate's `tracing` spans through the
//!   installed OpenTelemetry tracer

use opentelemetry_sdk::trace::Tracer;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logging.
///
/// This sets up:
/// - Console logging with target, thread ids and source location
/// - A level filter parsed from `log_level`, falling back to `info`
/// - The OpenTelemetry bridge from [`otel_layer`] when `tracer` is given
///
/// # Errors
///
/// Fails if a global subscriber has already been installed.
pub fn init_logging(log_level: &str, tracer: Option<Tracer>) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(tracer.map(otel_layer))
        .try_init()?;

    tracing::info!(level = log_level, "Logging initialized");
    Ok(())
}

/// Layer exporting `otelbeat` spans through `tracer`.
///
/// Spans from other targets are left out so exporter internals never feed
/// back into the exporter.
pub fn otel_layer<S>(tracer: Tracer) -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_opentelemetry::layer()
        .with_tracer(tracer)
        .with_filter(Targets::new().with_target("otelbeat", Level::TRACE))
}

/// Initialize logging for tests (only logs errors).
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
