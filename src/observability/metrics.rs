//! Meter provider construction and the outcome counters.
//!
//! Key metrics:
//! - success: Counter for requests classified as successful
//! - failed: Counter for requests carrying an error indicator

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use opentelemetry_sdk::runtime::{self, Runtime};
use opentelemetry_sdk::Resource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::BackgroundRuntime;
use crate::config::{ExporterKind, Protocol, SinkConfig};
use crate::error::{Signal, TelemetryError};

/// Name of the counter bumped for successful requests.
pub const SUCCESS_COUNTER: &str = "success";

/// Name of the counter bumped for failed requests.
pub const FAILED_COUNTER: &str = "failed";

/// Build the meter provider for `sink`.
///
/// With [`ExporterKind::None`] metrics are recorded into a manual reader and
/// never exported. Otherwise a periodic reader pushes to the collector every
/// `interval`.
///
/// # Errors
///
/// Returns [`TelemetryError::ExporterInit`] when the endpoint is malformed or
/// the exporter cannot be built.
pub fn init_metrics(
    sink: &SinkConfig,
    resource: Resource,
    interval: Duration,
) -> Result<SdkMeterProvider, TelemetryError> {
    if sink.exporter == ExporterKind::None {
        tracing::info!("Metrics exporter disabled, using manual reader");
        return Ok(manual_provider(resource));
    }

    let init_error = |reason: String| TelemetryError::ExporterInit {
        signal: Signal::Metrics,
        reason,
    };

    sink.validate_endpoint().map_err(init_error)?;
    let background = BackgroundRuntime::detect().map_err(init_error)?;
    let endpoint = sink.signal_endpoint();

    let exporter: MetricsExporterBuilder = match sink.protocol {
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

    let provider = match background {
        BackgroundRuntime::Tokio => {
            periodic_pipeline(runtime::Tokio, exporter, interval, resource)
        }
        BackgroundRuntime::TokioCurrentThread => {
            periodic_pipeline(runtime::TokioCurrentThread, exporter, interval, resource)
        }
    }
    .map_err(init_error)?;

    tracing::info!(
        endpoint = %endpoint,
        period = ?interval,
        runtime = ?background,
        "OTLP metrics exporter configured"
    );
    Ok(provider)
}

fn periodic_pipeline<R: Runtime>(
    runtime: R,
    exporter: MetricsExporterBuilder,
    interval: Duration,
    resource: Resource,
) -> Result<SdkMeterProvider, String> {
    opentelemetry_otlp::new_pipeline()
        .metrics(runtime)
        .with_exporter(exporter)
        .with_period(interval)
        .with_resource(resource)
        .build()
        .map_err(|e| e.to_string())
}

/// A meter provider whose metrics are recorded but not exported.
pub fn manual_provider(resource: Resource) -> SdkMeterProvider {
    let reader = ManualReader::builder().build();
    SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build()
}

/// A named counter plus an in-process running total.
///
/// The OpenTelemetry counter feeds the exporter; the atomic total lets the
/// harness report what it emitted without reading back from the SDK.
#[derive(Debug)]
pub struct OutcomeCounter {
    name: &'static str,
    counter: Counter<u64>,
    total: AtomicU64,
}

impl OutcomeCounter {
    fn new(meter: &Meter, name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            counter: meter
                .u64_counter(name)
                .with_description(description)
                .with_unit("1")
                .init(),
            total: AtomicU64::new(0),
        }
    }

    /// Record one occurrence.
    pub fn increment(&self, attributes: &[KeyValue]) {
        self.counter.add(1, attributes);
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    /// Counter name as exported.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of increments recorded so far.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

/// The two counters every invocation chooses between.
#[derive(Debug)]
pub struct OutcomeCounters {
    pub success: OutcomeCounter,
    pub failed: OutcomeCounter,
}

impl OutcomeCounters {
    /// Create both counters from a meter.
    pub fn new(meter: &Meter) -> Self {
        Self {
            success: OutcomeCounter::new(
                meter,
                SUCCESS_COUNTER,
                "Requests processed without an error indicator",
            ),
            failed: OutcomeCounter::new(
                meter,
                FAILED_COUNTER,
                "Requests rejected because of an error indicator",
            ),
        }
    }
}
