//! Trace provider construction.
//!
//! Builds the OTLP span exporter for the configured protocol and wraps it in
//! a batching provider running on the caller's flavor of tokio runtime.

use opentelemetry_otlp::{SpanExporterBuilder, WithExportConfig};
use opentelemetry_sdk::trace::{self as sdktrace, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};

use super::BackgroundRuntime;
use crate::config::{ExporterKind, Protocol, SinkConfig};
use crate::error::{Signal, TelemetryError};

/// Build the trace provider for `sink`.
///
/// With [`ExporterKind::None`] the provider records spans but exports
/// nothing. Must be called from within a tokio runtime when exporting.
///
/// # Errors
///
/// Returns [`TelemetryError::ExporterInit`] when the endpoint is malformed or
/// the exporter cannot be built.
pub fn init_tracing(
    sink: &SinkConfig,
    resource: Resource,
) -> Result<TracerProvider, TelemetryError> {
    let config = sdktrace::Config::default().with_resource(resource);

    if sink.exporter == ExporterKind::None {
        tracing::info!("Traces exporter disabled, spans are not exported");
        return Ok(TracerProvider::builder().with_config(config).build());
    }

    let init_error = |reason: String| TelemetryError::ExporterInit {
        signal: Signal::Traces,
        reason,
    };

    sink.validate_endpoint().map_err(init_error)?;
    let background = BackgroundRuntime::detect().map_err(init_error)?;
    let endpoint = sink.signal_endpoint();

    let exporter: SpanExporterBuilder = match sink.protocol {
        Protocol::Grpc => opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint.clone())
            .with_protocol(opentelemetry_otlp::Protocol::Grpc)
            .with_timeout(sink.timeout)
            .into(),
        Protocol::HttpProtobuf => opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(endpoint.clone())
            .with_protocol(opentelemetry_otlp::Protocol::HttpBinary)
            .with_timeout(sink.timeout)
            .into(),
    };

    let pipeline = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(config);
    let provider = match background {
        BackgroundRuntime::Tokio => pipeline.install_batch(runtime::Tokio),
        BackgroundRuntime::TokioCurrentThread => {
            pipeline.install_batch(runtime::TokioCurrentThread)
        }
    }
    .map_err(|e| init_error(e.to_string()))?;

    tracing::info!(
        endpoint = %endpoint,
        protocol = ?sink.protocol,
        runtime = ?background,
        "OTLP trace exporter configured"
    );
    Ok(provider)
}
