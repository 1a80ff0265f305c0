//! Schema Endpoints for HTTP Dev Server
//!
//! # Endpoints
//!
//! - `POST /api/schema/validate` - Validate a schema, always answering with the report
//! - `POST /api/schema/import` - Import a schema, refusing one with errors

use axum::{response::Json, routing::post, Router};
use formspec_core::{
    import_schema, validate_schema, FormSchema, FormServiceError, SchemaDiagnostic,
    ValidationReport,
};
use serde::Serialize;

use crate::dev_server::{AppState, HttpError};

/// Response for a successful import
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub schema: FormSchema,
    pub warnings: Vec<SchemaDiagnostic>,
}

/// POST /api/schema/validate
///
/// ```bash
/// curl -X POST http://localhost:3001/api/schema/validate \
///   -H 'Content-Type: application/json' -d '{"title": "T", "fields": []}'
/// ```
async fn validate(Json(body): Json<serde_json::Value>) -> Result<Json<ValidationReport>, HttpError> {
    let schema: FormSchema = serde_json::from_value(body).map_err(FormServiceError::from)?;
    Ok(Json(validate_schema(&schema)))
}

/// POST /api/schema/import
///
/// The body is the raw schema document; a rejected import answers 400 with
/// the diagnostic list in `details`.
async fn import(body: String) -> Result<Json<ImportResponse>, HttpError> {
    let imported = import_schema(&body)?;
    Ok(Json(ImportResponse {
        schema: imported.schema,
        warnings: imported.report.warnings,
    }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/schema/validate", post(validate))
        .route("/api/schema/import", post(import))
        .with_state(state)
}
