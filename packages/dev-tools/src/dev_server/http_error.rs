//! HTTP error handling for dev server
//!
//! Every failure leaves the server as `{ message, code, details }` JSON with
//! a status derived from `code`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use formspec_core::FormServiceError;
use formspec_formula::FormulaError;
use serde::{Deserialize, Serialize};

/// HTTP error response body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    /// User-facing error message
    pub message: String,
    /// Machine-readable error code
    pub code: String,
    /// Optional detailed error information for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(
        message: impl Into<String>,
        code: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            details: Some(details.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "UNKNOWN_FIELD" => StatusCode::NOT_FOUND,
            "INVALID_INPUT" | "SCHEMA_REJECTED" | "FORMULA_ERROR" => StatusCode::BAD_REQUEST,
            "INVALID_CONFIG" => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<FormServiceError> for HttpError {
    fn from(err: FormServiceError) -> Self {
        match err {
            FormServiceError::UnknownField { name } => {
                HttpError::new(format!("Unknown field: {}", name), "UNKNOWN_FIELD")
            }
            FormServiceError::SchemaRejected { ref errors } => {
                let details = serde_json::to_string(errors).unwrap_or_default();
                HttpError::with_details(err.to_string(), "SCHEMA_REJECTED", details)
            }
            FormServiceError::Serialization(e) => {
                HttpError::new(format!("Invalid JSON: {}", e), "INVALID_INPUT")
            }
            FormServiceError::InvalidConfig(message) => HttpError::new(message, "INVALID_CONFIG"),
            other => HttpError::with_details(other.to_string(), "INTERNAL_ERROR", format!("{:?}", other)),
        }
    }
}

impl From<FormulaError> for HttpError {
    fn from(err: FormulaError) -> Self {
        HttpError::new(err.to_string(), "FORMULA_ERROR")
    }
}
