//! Request payload model.
//!
//! A request is a JSON object with one recognized key, `error`. Every other
//! key is carried through untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Key whose presence marks a request as intended to fail.
pub const ERROR_FIELD: &str = "error";

/// A request handled by [`crate::service::Service::process`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Error indicator. `Some(Value::Null)` when the key is present with a
    /// null value, `None` only when the key is absent.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Value>,

    /// Opaque passthrough fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Keeps `"error": null` distinguishable from a missing key.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Request {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a passthrough field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set the error indicator.
    #[must_use]
    pub fn with_error(mut self, value: impl Into<Value>) -> Self {
        self.error = Some(value.into());
        self
    }

    /// Parse a request from a JSON object.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Whether the request asks to fail.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// The error indicator rendered as text, if present.
    ///
    /// Strings render without quotes; anything else renders as compact JSON.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
