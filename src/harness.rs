//! Synthetic request loop.
//!
//! Picks one of two sample requests at random for every iteration, processes
//! it, then sleeps. Up to `concurrency` iterations run at once. The loop stops
//! taking new iterations when the shutdown signal fires and drains the ones
//! already in flight.
//!
//! The loop runs inside a `request_loop` tracing span, and every operation
//! span is parented on it.

use futures::StreamExt;
use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::Config;
use crate::error::ProcessError;
use crate::request::Request;
use crate::service::Service;

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    pub iterations: u64,
    pub interval: Duration,
    pub concurrency: usize,
}

impl From<&Config> for HarnessConfig {
    fn from(config: &Config) -> Self {
        Self {
            iterations: config.iterations,
            interval: config.interval(),
            concurrency: config.concurrency,
        }
    }
}

/// Counts of what the loop observed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: u64,
    pub failed: u64,
    /// Calls rejected with [`ProcessError::MeterUnavailable`].
    pub unavailable: u64,
}

impl RunSummary {
    /// Total number of processed requests.
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed + self.unavailable
    }

    fn record(&mut self, result: &Result<Request, ProcessError>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(ProcessError::ClassifiedRequest(_)) => self.failed += 1,
            Err(ProcessError::MeterUnavailable) => self.unavailable += 1,
        }
    }
}

/// The two requests the loop chooses between.
pub fn sample_requests() -> [Request; 2] {
    [
        Request::new().with_field("foo", "bar"),
        Request::new().with_error("an any error"),
    ]
}

/// Drive `service` until the iteration budget is spent or `shutdown_rx`
/// turns true.
///
/// Every iteration that was started is counted in the summary, so the summary
/// matches the counter totals.
#[tracing::instrument(
    name = "request_loop",
    skip_all,
    fields(iterations = config.iterations, concurrency = config.concurrency)
)]
pub async fn run(
    service: &Service,
    config: HarnessConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> RunSummary {
    let samples = sample_requests();

    let stop = async move {
        if shutdown_rx.wait_for(|stop| *stop).await.is_err() {
            // Sender gone: nobody can ask us to stop any more.
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received, stopping request loop");
    };

    let loop_cx = tracing::Span::current().context();

    let summary = futures::stream::iter(0..config.iterations)
        .take_until(stop)
        .map(|_| {
            let request = samples[rand::rng().random_range(0..samples.len())].clone();
            let service = service.clone();
            let cx = loop_cx.clone();
            async move {
                let result = service.process(&cx, request);
                if let Err(ProcessError::MeterUnavailable) = &result {
                    tracing::warn!("Telemetry unavailable, request not recorded");
                }
                tokio::time::sleep(config.interval).await;
                result
            }
        })
        .buffer_unordered(config.concurrency.max(1))
        .fold(RunSummary::default(), |mut summary, result| async move {
            summary.record(&result);
            summary
        })
        .await;

    tracing::info!(
        processed = summary.processed(),
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Request loop finished"
    );
    summary
}
