//! Error types for the provider lifecycle and the instrumented operation.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Telemetry signal an exporter or provider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Traces,
    Metrics,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Traces => f.write_str("traces"),
            Self::Metrics => f.write_str("metrics"),
        }
    }
}

/// Errors raised while installing or shutting down telemetry providers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The exporter for a signal could not be constructed.
    #[error("failed to initialize {signal} exporter: {reason}")]
    ExporterInit { signal: Signal, reason: String },

    /// A telemetry installation is already live in this process.
    #[error("telemetry is already installed; shut it down before installing again")]
    AlreadyInstalled,

    /// A provider failed to flush or shut down.
    #[error("failed to flush {signal}: {reason}")]
    Flush { signal: Signal, reason: String },

    /// Flushing did not finish before the deadline.
    #[error("telemetry flush did not complete within {timeout:?}")]
    FlushTimeout { timeout: Duration },
}

/// Errors returned by a single instrumented invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// Counters could not be obtained because telemetry is not live.
    #[error("meter unavailable: telemetry is not installed")]
    MeterUnavailable,

    /// The request carried an error indicator; holds its stringified value.
    #[error("{0}")]
    ClassifiedRequest(String),
}
