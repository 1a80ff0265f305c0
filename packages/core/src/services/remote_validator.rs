//! Remote Validator Collaborator
//!
//! Async validators (`validations.asyncValidator`) hand the value to a remote
//! endpoint. The transport lives outside the core behind [`RemoteValidator`];
//! this module turns whatever payload comes back into a [`Verdict`] according
//! to the validator's `validWhen` mode.

use crate::models::{AsyncValidatorConfig, ValidWhen};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One remote check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteValidationRequest {
    pub endpoint: String,
    pub method: String,
    pub field_name: String,
    pub value: Value,
}

impl RemoteValidationRequest {
    pub fn new(config: &AsyncValidatorConfig, field_name: impl Into<String>, value: Value) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            method: config.method().to_string(),
            field_name: field_name.into(),
            value,
        }
    }
}

/// Performs remote checks; any error is treated as a failed request
#[async_trait]
pub trait RemoteValidator: Send + Sync {
    async fn validate(&self, request: &RemoteValidationRequest) -> anyhow::Result<Value>;
}

/// Interpreted outcome of a remote check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub valid: bool,
    /// Message supplied by the remote side, if any
    pub message: Option<String>,
}

impl Verdict {
    /// Interpret `payload` for the given mode
    ///
    /// - `custom` (and no mode): the payload's `valid` flag, a bare boolean
    ///   payload is the flag itself
    /// - `exists` / `notExists`: whether the payload reports an existing
    ///   record, read from an `exists` flag, an inverted `available` flag, a
    ///   positive `count`, a non-empty array, or any other non-null value
    pub fn from_payload(payload: &Value, valid_when: Option<ValidWhen>) -> Self {
        let valid = match valid_when.unwrap_or(ValidWhen::Custom) {
            ValidWhen::Custom => match payload {
                Value::Bool(b) => *b,
                other => other.get("valid").and_then(Value::as_bool).unwrap_or(false),
            },
            ValidWhen::Exists => record_exists(payload),
            ValidWhen::NotExists => !record_exists(payload),
        };

        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        Self { valid, message }
    }
}

fn record_exists(payload: &Value) -> bool {
    match payload {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => {
            if let Some(exists) = map.get("exists").and_then(Value::as_bool) {
                exists
            } else if let Some(available) = map.get("available").and_then(Value::as_bool) {
                !available
            } else if let Some(count) = map.get("count").and_then(Value::as_f64) {
                count > 0.0
            } else if let Some(data) = map.get("data") {
                record_exists(data)
            } else {
                !map.is_empty()
            }
        }
        _ => true,
    }
}
