//! Behavior tests for the instrumented operation.
//!
//! Tests:
//! - Error-indicator requests fail and bump only `failed`
//! - Plain requests pass through and bump only `success`
//! - Exactly one span per call, nested under the caller's span
//! - Counter totals under concurrent calls

mod common;

use opentelemetry::trace::{Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, Key, Value};
use opentelemetry_sdk::export::trace::SpanData;
use otelbeat::error::ProcessError;
use otelbeat::request::Request;
use otelbeat::service::process::OPERATION_NAME;
use otelbeat::service::Service;
use serde_json::json;

fn attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key == Key::from(key.to_string()))
        .map(|kv| &kv.value)
}

/// `{"foo":"bar"}` comes back unchanged and counts as a success.
#[test]
fn test_plain_request_succeeds() {
    let _guard = common::serial();
    let (telemetry, spans) = common::install_in_memory();
    let service = Service::new(telemetry.handle());

    let request = Request::from_json(r#"{"foo":"bar"}"#).unwrap();
    let response = service
        .process(&Context::new(), request.clone())
        .expect("plain request should succeed");

    assert_eq!(response, request);
    assert_eq!(serde_json::to_value(&response).unwrap(), json!({"foo": "bar"}));
    assert_eq!(service.telemetry().totals(), (1, 0));

    let finished = common::finished_spans(&spans);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].name, OPERATION_NAME);
    assert_eq!(finished[0].status, Status::Ok);
    assert_eq!(
        attribute(&finished[0], "request.outcome"),
        Some(&Value::from("success"))
    );
}

/// `{"error":"an any error"}` fails with the indicator as the error.
#[test]
fn test_error_indicator_fails() {
    let _guard = common::serial();
    let (telemetry, spans) = common::install_in_memory();
    let service = Service::new(telemetry.handle());

    let request = Request::from_json(r#"{"error":"an any error"}"#).unwrap();
    let err = service
        .process(&Context::new(), request)
        .expect_err("error indicator should fail");

    assert_eq!(err, ProcessError::ClassifiedRequest("an any error".into()));
    assert_eq!(err.to_string(), "an any error");
    assert_eq!(service.telemetry().totals(), (0, 1));

    let finished = common::finished_spans(&spans);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].status, Status::error("an any error"));
    assert_eq!(
        attribute(&finished[0], "request.outcome"),
        Some(&Value::from("failed"))
    );
}

/// A non-string indicator is carried as its JSON rendering.
#[test]
fn test_structured_indicator_is_stringified() {
    let _guard = common::serial();
    let (telemetry, spans) = common::install_in_memory();
    let service = Service::new(telemetry.handle());

    let request = Request::new().with_field("id", 9).with_error(json!({"code": 42}));
    let err = service.process(&Context::new(), request).unwrap_err();

    assert_eq!(err, ProcessError::ClassifiedRequest(r#"{"code":42}"#.into()));
    assert_eq!(
        common::finished_spans(&spans)[0].status,
        Status::error(r#"{"code":42}"#)
    );
}

/// Every call ends exactly one span and each span gets its own request id.
#[test]
fn test_one_span_per_call() {
    let _guard = common::serial();
    let (telemetry, spans) = common::install_in_memory();
    let service = Service::new(telemetry.handle());

    for i in 0..10 {
        let request = if i % 2 == 0 {
            Request::new().with_field("n", i)
        } else {
            Request::new().with_error(format!("failure {i}"))
        };
        let _ = service.process(&Context::new(), request);
    }

    let finished = common::finished_spans(&spans);
    assert_eq!(common::spans_named(&finished, OPERATION_NAME).len(), 10);
    assert_eq!(service.telemetry().totals(), (5, 5));

    let mut ids: Vec<String> = finished
        .iter()
        .filter_map(|span| attribute(span, "request.id"))
        .map(ToString::to_string)
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10, "request ids should be unique");
}

/// The operation span is a child of the span active in the caller's context.
#[test]
fn test_span_nests_under_caller_context() {
    let _guard = common::serial();
    let (telemetry, spans) = common::install_in_memory();
    let service = Service::new(telemetry.handle());

    let parent = telemetry.tracer().start("caller");
    let parent_cx = Context::new().with_span(parent);
    let parent_context = parent_cx.span().span_context().clone();

    service
        .process(&parent_cx, Request::new().with_field("foo", "bar"))
        .unwrap();
    parent_cx.span().end();

    let finished = common::finished_spans(&spans);
    let child = common::spans_named(&finished, OPERATION_NAME);
    assert_eq!(child.len(), 1);
    assert_eq!(child[0].parent_span_id, parent_context.span_id());
    assert_eq!(child[0].span_context.trace_id(), parent_context.trace_id());
}

/// Totals match the submitted split regardless of interleaving.
#[test]
fn test_concurrent_calls_count_exactly() {
    let _guard = common::serial();
    let (telemetry, spans) = common::install_in_memory();
    let service = Service::new(telemetry.handle());

    std::thread::scope(|s| {
        for worker in 0..8 {
            let service = service.clone();
            s.spawn(move || {
                for i in 0..50 {
                    let request = if (worker + i) % 4 == 0 {
                        Request::new().with_error("boom")
                    } else {
                        Request::new().with_field("worker", worker)
                    };
                    let _ = service.process(&Context::new(), request);
                }
            });
        }
    });

    // 400 calls, every fourth (worker + i) fails: 100 failures.
    assert_eq!(service.telemetry().totals(), (300, 100));

    let finished = common::finished_spans(&spans);
    assert_eq!(finished.len(), 400);
    let errors = finished
        .iter()
        .filter(|span| matches!(span.status, Status::Error { .. }))
        .count();
    assert_eq!(errors, 100);
}

/// After shutdown the counters are gone and no span is produced.
#[tokio::test]
async fn test_process_after_shutdown_is_meter_unavailable() {
    let _guard = common::serial();
    let (telemetry, _spans) = common::install_in_memory();
    let service = Service::new(telemetry.handle());

    service
        .process(&Context::new(), Request::new().with_field("foo", "bar"))
        .unwrap();
    telemetry
        .shutdown(std::time::Duration::from_secs(5))
        .await
        .expect("shutdown");

    let err = service
        .process(&Context::new(), Request::new().with_field("foo", "bar"))
        .unwrap_err();
    assert_eq!(err, ProcessError::MeterUnavailable);
    assert_eq!(service.telemetry().totals(), (1, 0));
    assert!(!service.telemetry().is_live());
}
