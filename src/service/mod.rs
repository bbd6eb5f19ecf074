//! The instrumented operation.

pub mod process;

use opentelemetry::Context;

use crate::error::ProcessError;
use crate::request::Request;
use crate::telemetry::TelemetryHandle;

/// Request-processing service bound to an installed telemetry.
///
/// Cheap to clone; clones share the same counters and tracer.
#[derive(Debug, Clone)]
pub struct Service {
    telemetry: TelemetryHandle,
}

impl Service {
    /// Create a new service emitting through `telemetry`.
    pub fn new(telemetry: TelemetryHandle) -> Self {
        Self { telemetry }
    }

    /// Classify one request, emitting one span and one counter increment.
    ///
    /// `cx` is the caller's context; the span becomes its child when it
    /// carries an active span.
    pub fn process(&self, cx: &Context, request: Request) -> Result<Request, ProcessError> {
        process::handle_process(&self.telemetry, cx, request)
    }

    /// The telemetry this service emits through.
    pub fn telemetry(&self) -> &TelemetryHandle {
        &self.telemetry
    }
}
