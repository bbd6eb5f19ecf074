//! Test utilities for Otelbeat tests.
//!
//! Provides:
//! - Serialization of tests that install process-wide telemetry
//! - In-memory providers whose finished spans can be inspected
//! - A span exporter that keeps what it received across shutdown

#![allow(dead_code)]

use futures::future::{self, BoxFuture};
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use otelbeat::observability::metrics::manual_provider;
use otelbeat::observability::resource;
use otelbeat::telemetry::Telemetry;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

static INSTALL_LOCK: Mutex<()> = Mutex::new(());

/// Hold this for the whole test when it installs telemetry.
///
/// Only one installation may be live per process, and tests in one binary
/// share a process.
pub fn serial() -> MutexGuard<'static, ()> {
    INSTALL_LOCK
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Providers backed by an in-memory span exporter and a manual reader.
pub fn in_memory_providers() -> (TracerProvider, SdkMeterProvider, InMemorySpanExporter) {
    let spans = InMemorySpanExporter::default();
    let tracer_provider = TracerProvider::builder()
        .with_simple_exporter(spans.clone())
        .build();
    let meter_provider = manual_provider(resource("otelbeat-test"));
    (tracer_provider, meter_provider, spans)
}

/// Install in-memory telemetry. Call [`serial`] first.
pub fn install_in_memory() -> (Telemetry, InMemorySpanExporter) {
    let (tracer_provider, meter_provider, spans) = in_memory_providers();
    let telemetry =
        Telemetry::from_providers(tracer_provider, meter_provider).expect("install telemetry");
    (telemetry, spans)
}

/// Spans finished so far.
///
/// Read these before shutdown; the in-memory exporter forgets them when it
/// is shut down.
pub fn finished_spans(exporter: &InMemorySpanExporter) -> Vec<SpanData> {
    exporter
        .get_finished_spans()
        .expect("read finished spans")
}

/// Finished spans with the given name.
pub fn spans_named<'a>(spans: &'a [SpanData], name: &str) -> Vec<&'a SpanData> {
    spans.iter().filter(|span| span.name == name).collect()
}

/// Span exporter that records every exported batch.
///
/// Unlike [`InMemorySpanExporter`] it keeps its spans after shutdown, and it
/// can be told to stall in `shutdown` to simulate a slow collector.
#[derive(Debug, Clone, Default)]
pub struct RecordingExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    shutdown_delay: Duration,
}

impl RecordingExporter {
    pub fn with_shutdown_delay(delay: Duration) -> Self {
        Self {
            shutdown_delay: delay,
            ..Self::default()
        }
    }

    /// Names of every span exported so far.
    pub fn exported_names(&self) -> Vec<String> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|span| span.name.to_string())
            .collect()
    }
}

impl SpanExporter for RecordingExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
        Box::pin(future::ready(Ok(())))
    }

    fn shutdown(&mut self) {
        std::thread::sleep(self.shutdown_delay);
    }
}

/// Wait for a condition to become true with timeout.
///
/// Returns `true` if the condition was met, `false` if the timeout expired.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_lock_is_reentrant_after_release() {
        drop(serial());
        let _guard = serial();
    }

    #[test]
    fn test_recording_exporter_starts_empty() {
        assert!(RecordingExporter::default().exported_names().is_empty());
    }
}
