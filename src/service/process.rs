//! Process handler implementation.
//!
//! Classifies a request by its error indicator and records the outcome as a
//! span status plus a counter increment.

use opentelemetry::trace::{Span as _, Status, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::Span;

use crate::error::ProcessError;
use crate::generate_request_id;
use crate::request::Request;
use crate::telemetry::TelemetryHandle;

/// Span name and `service.operation` attribute value.
pub const OPERATION_NAME: &str = "Service.Process";

/// Ends the wrapped span when dropped, on every exit path.
struct EndOnDrop(Span);

impl Drop for EndOnDrop {
    fn drop(&mut self) {
        self.0.end();
    }
}

/// Handle a single request.
///
/// Fails fast with [`ProcessError::MeterUnavailable`] before opening a span
/// if telemetry has been shut down.
pub fn handle_process(
    telemetry: &TelemetryHandle,
    cx: &Context,
    request: Request,
) -> Result<Request, ProcessError> {
    let counters = telemetry.counters()?;

    let request_id = generate_request_id();
    let mut span = EndOnDrop(telemetry.tracer().start_with_context(OPERATION_NAME, cx));
    span.0.set_attribute(KeyValue::new("request.id", request_id.clone()));

    let attributes = [KeyValue::new("service.operation", OPERATION_NAME)];

    match request.error_message() {
        Some(message) => {
            counters.failed.increment(&attributes);
            span.0.set_attribute(KeyValue::new("request.outcome", "failed"));
            span.0.set_status(Status::error(message.clone()));

            tracing::debug!(request_id = %request_id, error = %message, "Request failed");
            Err(ProcessError::ClassifiedRequest(message))
        }
        None => {
            counters.success.increment(&attributes);
            span.0.set_attribute(KeyValue::new("request.outcome", "success"));
            span.0.set_status(Status::Ok);

            tracing::debug!(request_id = %request_id, "Request succeeded");
            Ok(request)
        }
    }
}
