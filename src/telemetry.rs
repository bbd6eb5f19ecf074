//! Provider lifecycle management.
//!
//! [`Telemetry`] owns the trace and meter providers for the whole process:
//! - Installation registers both providers as the global defaults
//! - Only one installation may be live at a time
//! - [`Telemetry::shutdown`] flushes and closes both providers under a
//!   deadline; dropping an un-shut-down `Telemetry` flushes as a fallback,
//!   bounded by the drop timeout
//! - The slot stays claimed until the close has actually finished
//!
//! Operations get at the providers through a cloneable [`TelemetryHandle`].

use opentelemetry::global;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::noop::NoopTracerProvider;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::config::TelemetryConfig;
use crate::error::{ProcessError, Signal, TelemetryError};
use crate::observability::metrics::{init_metrics, OutcomeCounters};
use crate::observability::tracing::init_tracing;
use crate::observability::{resource, INSTRUMENTATION_SCOPE};

/// How long dropping an un-shut-down [`Telemetry`] waits for the flush.
pub const DEFAULT_DROP_TIMEOUT: Duration = Duration::from_secs(5);

/// Set while a [`Telemetry`] is installed in this process.
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Exclusive claim on the process-wide installation slot.
///
/// Released when dropped.
struct InstallClaim(());

impl InstallClaim {
    fn acquire() -> Result<Self, TelemetryError> {
        INSTALLED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| Self(()))
            .map_err(|_| TelemetryError::AlreadyInstalled)
    }
}

impl Drop for InstallClaim {
    fn drop(&mut self) {
        INSTALLED.store(false, Ordering::SeqCst);
    }
}

/// State shared between the owner and every handle.
struct Shared {
    tracer_provider: TracerProvider,
    meter_provider: SdkMeterProvider,
    tracer: Tracer,
    counters: OutcomeCounters,
    live: AtomicBool,
}

impl Shared {
    /// Flush and shut down both providers. Runs at most once.
    fn close(&self) -> Result<(), TelemetryError> {
        if !self.live.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let traces = self
            .tracer_provider
            .shutdown()
            .map_err(|e| TelemetryError::Flush {
                signal: Signal::Traces,
                reason: e.to_string(),
            });
        let metrics = self
            .meter_provider
            .shutdown()
            .map_err(|e| TelemetryError::Flush {
                signal: Signal::Metrics,
                reason: e.to_string(),
            });

        // Late `global::tracer` and `global::meter` users get no-ops.
        let _ = global::set_tracer_provider(NoopTracerProvider::new());
        global::set_meter_provider(SdkMeterProvider::builder().build());

        match (traces, metrics) {
            (Err(traces), Err(metrics)) => {
                tracing::error!(error = %metrics, "Metrics flush failed");
                Err(traces)
            }
            (traces, metrics) => traces.and(metrics),
        }
    }
}

/// Close on a dedicated thread and wait at most `timeout` for it.
///
/// The calling thread may be the only one driving the runtime the exporters
/// need, so it must never wait unboundedly on the close.
fn close_on_helper_thread<F>(close: F, timeout: Duration) -> Result<(), TelemetryError>
where
    F: FnOnce() -> Result<(), TelemetryError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("otelbeat-flush".into())
        .spawn(move || {
            let _ = tx.send(close());
        })
        .map_err(|e| TelemetryError::Flush {
            signal: Signal::Traces,
            reason: format!("failed to spawn flush thread: {e}"),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(TelemetryError::FlushTimeout { timeout }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(TelemetryError::Flush {
            signal: Signal::Traces,
            reason: "flush thread panicked".into(),
        }),
    }
}

/// Owner of the installed trace and meter providers.
///
/// Call [`Telemetry::shutdown`] once all work using the providers has
/// finished. If the owner is dropped instead, the providers are flushed on a
/// helper thread for at most the drop timeout and any failure is logged.
pub struct Telemetry {
    shared: Arc<Shared>,
    /// Held until the providers are closed; `None` once handed to the close.
    claim: Option<InstallClaim>,
    drop_timeout: Duration,
}

impl Telemetry {
    /// Build OTLP providers from `config` and install them.
    ///
    /// Must be called from within a tokio runtime when any exporter is
    /// enabled.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::AlreadyInstalled`] if another installation is live
    /// - [`TelemetryError::ExporterInit`] if either exporter cannot be built
    pub fn install(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let claim = InstallClaim::acquire()?;
        let resource = resource(&config.service_name);

        let tracer_provider = init_tracing(&config.traces, resource.clone())?;
        let meter_provider = match init_metrics(&config.metrics, resource, config.metric_interval) {
            Ok(provider) => provider,
            Err(e) => {
                let _ = tracer_provider.shutdown();
                return Err(e);
            }
        };

        Ok(Self::register(claim, tracer_provider, meter_provider))
    }

    /// Install already-built providers.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::AlreadyInstalled`] if another installation
    /// is live.
    pub fn from_providers(
        tracer_provider: TracerProvider,
        meter_provider: SdkMeterProvider,
    ) -> Result<Self, TelemetryError> {
        let claim = InstallClaim::acquire()?;
        Ok(Self::register(claim, tracer_provider, meter_provider))
    }

    fn register(
        claim: InstallClaim,
        tracer_provider: TracerProvider,
        meter_provider: SdkMeterProvider,
    ) -> Self {
        let _ = global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        let tracer = tracer_provider.tracer(INSTRUMENTATION_SCOPE);
        let meter = meter_provider.meter(INSTRUMENTATION_SCOPE);
        let counters = OutcomeCounters::new(&meter);

        tracing::debug!("Trace and meter providers registered");

        Self {
            shared: Arc::new(Shared {
                tracer_provider,
                meter_provider,
                tracer,
                counters,
                live: AtomicBool::new(true),
            }),
            claim: Some(claim),
            drop_timeout: DEFAULT_DROP_TIMEOUT,
        }
    }

    /// Bound the flush performed when this is dropped without shutdown.
    pub fn with_drop_timeout(mut self, timeout: Duration) -> Self {
        self.drop_timeout = timeout;
        self
    }

    /// Whether a telemetry installation is currently live in this process.
    pub fn is_installed() -> bool {
        INSTALLED.load(Ordering::SeqCst)
    }

    /// A handle for instrumented operations.
    pub fn handle(&self) -> TelemetryHandle {
        TelemetryHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The installed tracer, for bridging `tracing` spans.
    pub fn tracer(&self) -> Tracer {
        self.shared.tracer.clone()
    }

    /// Flush and shut down both providers.
    ///
    /// Callers must drain in-flight operations first. Handles stay valid but
    /// report [`ProcessError::MeterUnavailable`] afterwards. The installation
    /// slot is released when the close finishes, which after a timeout may be
    /// later than this returns.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::Flush`] if a provider fails to flush or close
    /// - [`TelemetryError::FlushTimeout`] if closing takes longer than
    ///   `timeout`; the flush keeps running in the background and is not
    ///   retried
    pub async fn shutdown(mut self, timeout: Duration) -> Result<(), TelemetryError> {
        let close = self.take_close();
        let task = tokio::task::spawn_blocking(close);

        let result = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(TelemetryError::Flush {
                signal: Signal::Traces,
                reason: format!("flush task failed: {join_error}"),
            }),
            Err(_) => Err(TelemetryError::FlushTimeout { timeout }),
        };

        match &result {
            Ok(()) => tracing::info!("Telemetry flushed and shut down"),
            Err(e) => tracing::error!(error = %e, "Telemetry shutdown failed"),
        }
        result
    }

    /// The close to run, owning the installation claim until it returns.
    fn take_close(&mut self) -> impl FnOnce() -> Result<(), TelemetryError> + Send + 'static {
        let claim = self.claim.take();
        let shared = Arc::clone(&self.shared);
        move || {
            let result = shared.close();
            drop(claim);
            result
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if self.claim.is_none() {
            return;
        }
        tracing::warn!("Telemetry dropped without shutdown, flushing now");

        let close = self.take_close();
        let timeout = self.drop_timeout;
        let result = match Handle::try_current().map(|h| h.runtime_flavor()) {
            Ok(RuntimeFlavor::CurrentThread) | Err(_) => close_on_helper_thread(close, timeout),
            Ok(_) => tokio::task::block_in_place(|| close_on_helper_thread(close, timeout)),
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "Telemetry flush on drop failed");
        }
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("live", &self.shared.live.load(Ordering::SeqCst))
            .field("claimed", &self.claim.is_some())
            .field("drop_timeout", &self.drop_timeout)
            .finish_non_exhaustive()
    }
}

/// Cloneable access to the installed tracer and counters.
#[derive(Clone)]
pub struct TelemetryHandle {
    shared: Arc<Shared>,
}

impl TelemetryHandle {
    /// Whether the providers are still accepting telemetry.
    pub fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// The tracer for instrumented operations.
    pub fn tracer(&self) -> &Tracer {
        &self.shared.tracer
    }

    /// The outcome counters.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::MeterUnavailable`] once the providers have
    /// been shut down.
    pub fn counters(&self) -> Result<&OutcomeCounters, ProcessError> {
        if self.is_live() {
            Ok(&self.shared.counters)
        } else {
            Err(ProcessError::MeterUnavailable)
        }
    }

    /// Running totals as `(success, failed)`, readable even after shutdown.
    pub fn totals(&self) -> (u64, u64) {
        let counters = &self.shared.counters;
        (counters.success.total(), counters.failed.total())
    }
}

impl fmt::Debug for TelemetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryHandle")
            .field("live", &self.is_live())
            .finish_non_exhaustive()
    }
}
