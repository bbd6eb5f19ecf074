//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - Trace provider construction with OTLP export
//! - Meter provider construction and the outcome counters
//! - Structured logging bridged into the installed tracer

pub mod logging;
pub mod metrics;
pub mod tracing;

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Instrumentation scope name used for the tracer and the meter.
pub const INSTRUMENTATION_SCOPE: &str = "otelbeat";

/// Resource attributes shared by both providers.
pub fn resource(service_name: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ])
}

/// Runtime the batch span processor and periodic reader run their tasks on.
///
/// On a current-thread runtime the SDK tasks get their own thread, so a
/// blocking flush from the runtime thread can still make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BackgroundRuntime {
    Tokio,
    TokioCurrentThread,
}

impl BackgroundRuntime {
    /// Pick the background runtime matching the caller's tokio runtime.
    pub(crate) fn detect() -> Result<Self, String> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::CurrentThread => {
                Ok(Self::TokioCurrentThread)
            }
            Ok(_) => Ok(Self::Tokio),
            Err(_) => Err("OTLP export must be set up from within a tokio runtime".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_requires_runtime() {
        assert!(BackgroundRuntime::detect().is_err());
    }

    #[tokio::test]
    async fn test_detect_current_thread() {
        assert_eq!(
            BackgroundRuntime::detect(),
            Ok(BackgroundRuntime::TokioCurrentThread)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_detect_multi_thread() {
        assert_eq!(BackgroundRuntime::detect(), Ok(BackgroundRuntime::Tokio));
    }
}
