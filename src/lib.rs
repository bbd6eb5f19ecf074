//! Otelbeat: an OpenTelemetry instrumentation harness.
//!
//! Otelbeat installs a trace provider and a meter provider pointed at an OTLP
//! collector, then drives a synthetic request loop where every request yields
//! exactly one span and exactly one counter increment.
//!
//! # Architecture
//!
//! - **Explicit lifecycle**: [`telemetry::Telemetry`] owns both providers and
//!   flushes them on shutdown, or on drop if shutdown never ran
//! - **One installation per process**: a second install while one is live is
//!   rejected
//! - **Correlated telemetry**: each invocation span nests under the caller's
//!   context and carries the request outcome
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`error`]: Lifecycle and per-request error types
//! - [`harness`]: Synthetic request loop
//! - [`observability`]: Provider construction and logging setup
//! - [`request`]: Request payload model
//! - [`service`]: The instrumented operation
//! - [`telemetry`]: Provider lifecycle manager

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // telemetry::TelemetryHandle is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod config;
pub mod error;
pub mod harness;
pub mod observability;
pub mod request;
pub mod service;
pub mod telemetry;

use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) request ID.
///
/// # Example
///
/// ```
/// let id = otelbeat::generate_request_id();
/// assert!(id.len() == 36); // UUID string format
/// ```
#[must_use]
pub fn generate_request_id() -> String {
    Uuid::now_v7().to_string()
}
