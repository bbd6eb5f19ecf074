//! Configuration parsing for Otelbeat.
//!
//! Supports:
//! - CLI arguments via clap
//! - Standard `OTEL_*` environment variables
//! - Sensible defaults for a local collector

use clap::{Parser, ValueEnum};
use std::time::Duration;
use url::Url;

use crate::error::Signal;

/// Otelbeat: an OpenTelemetry instrumentation harness.
#[derive(Parser, Debug, Clone)]
#[command(name = "otelbeat")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// OTLP collector endpoint (URL with http:// or https:// scheme)
    #[arg(
        long,
        env = "OTEL_EXPORTER_OTLP_ENDPOINT",
        default_value = "http://localhost:4317"
    )]
    pub endpoint: String,

    /// OTLP transport protocol
    #[arg(
        long,
        env = "OTEL_EXPORTER_OTLP_PROTOCOL",
        value_enum,
        default_value_t = Protocol::Grpc
    )]
    pub protocol: Protocol,

    /// Exporter used for traces
    #[arg(
        long,
        env = "OTEL_TRACES_EXPORTER",
        value_enum,
        default_value_t = ExporterKind::Otlp
    )]
    pub traces_exporter: ExporterKind,

    /// Exporter used for metrics
    #[arg(
        long,
        env = "OTEL_METRICS_EXPORTER",
        value_enum,
        default_value_t = ExporterKind::Otlp
    )]
    pub metrics_exporter: ExporterKind,

    /// Service name attached to all exported telemetry
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "otelbeat")]
    pub service_name: String,

    /// Per-export timeout in seconds
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TIMEOUT_SECS", default_value_t = 10)]
    pub export_timeout_secs: u64,

    /// Interval between periodic metric exports in seconds
    #[arg(long, env = "OTEL_METRIC_EXPORT_INTERVAL_SECS", default_value_t = 10)]
    pub metric_interval_secs: u64,

    /// Deadline for flushing telemetry at shutdown, in seconds
    #[arg(long, env = "OTELBEAT_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Number of synthetic requests to process
    #[arg(short = 'n', long, env = "OTELBEAT_ITERATIONS", default_value_t = 1000)]
    pub iterations: u64,

    /// Pause after each request, in milliseconds
    #[arg(long, env = "OTELBEAT_INTERVAL_MS", default_value_t = 10)]
    pub interval_ms: u64,

    /// Maximum number of requests in flight
    #[arg(short, long, env = "OTELBEAT_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// OTLP transport framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    /// OTLP over gRPC (tonic)
    #[value(name = "grpc")]
    Grpc,
    /// OTLP over HTTP with protobuf bodies
    #[value(name = "http/protobuf")]
    HttpProtobuf,
}

/// Where a signal's telemetry goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExporterKind {
    /// Export to the OTLP endpoint
    Otlp,
    /// Record in-process only
    None,
}

/// Sink options for one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub signal: Signal,
    pub endpoint: String,
    pub protocol: Protocol,
    pub exporter: ExporterKind,
    pub timeout: Duration,
}

/// Everything needed to install the trace and meter providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub traces: SinkConfig,
    pub metrics: SinkConfig,
    pub metric_interval: Duration,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Provider settings derived from this configuration.
    pub fn telemetry(&self) -> TelemetryConfig {
        let sink = |signal, exporter| SinkConfig {
            signal,
            endpoint: self.endpoint.clone(),
            protocol: self.protocol,
            exporter,
            timeout: Duration::from_secs(self.export_timeout_secs),
        };
        TelemetryConfig {
            service_name: self.service_name.clone(),
            traces: sink(Signal::Traces, self.traces_exporter),
            metrics: sink(Signal::Metrics, self.metrics_exporter),
            metric_interval: Duration::from_secs(self.metric_interval_secs),
        }
    }

    /// Deadline for the shutdown flush.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Pause between requests.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4317".into(),
            protocol: Protocol::Grpc,
            traces_exporter: ExporterKind::Otlp,
            metrics_exporter: ExporterKind::Otlp,
            service_name: "otelbeat".into(),
            export_timeout_secs: 10,
            metric_interval_secs: 10,
            shutdown_timeout_secs: 5,
            iterations: 1000,
            interval_ms: 10,
            concurrency: 1,
            log_level: "info".into(),
        }
    }
}

impl SinkConfig {
    /// Full URL for this signal's exporter.
    ///
    /// gRPC takes the base endpoint as-is; OTLP/HTTP posts to a per-signal
    /// path under it.
    pub fn signal_endpoint(&self) -> String {
        match self.protocol {
            Protocol::Grpc => self.endpoint.clone(),
            Protocol::HttpProtobuf => {
                let path = match self.signal {
                    Signal::Traces => "v1/traces",
                    Signal::Metrics => "v1/metrics",
                };
                format!("{}/{path}", self.endpoint.trim_end_matches('/'))
            }
        }
    }

    /// Check that the endpoint is an absolute http(s) URL with a host.
    pub fn validate_endpoint(&self) -> Result<(), String> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| format!("endpoint {:?} is not a valid URL: {e}", self.endpoint))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "endpoint {:?} must use the http or https scheme",
                self.endpoint
            ));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(format!("endpoint {:?} has no host", self.endpoint));
        }

        Ok(())
    }
}
