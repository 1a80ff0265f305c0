//! Form Evaluation Endpoints for HTTP Dev Server
//!
//! # Endpoints
//!
//! - `POST /api/form/evaluate` - Run one resolver pass over posted values

use axum::{extract::State, response::Json, routing::post, Router};
use formspec_core::{
    DependencyResolver, FieldErrors, FormSchema, FormServiceError, FormValues, OptionItem,
    ResolvedOptions,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dev_server::{AppState, HttpError};

/// Request body for form evaluation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub schema: serde_json::Value,
    /// Values layered over the schema's initial values
    #[serde(default)]
    pub values: FormValues,
    /// Field whose change triggered the pass; enables cascading resets
    #[serde(default)]
    pub changed: Option<String>,
}

/// Option state of one option-bearing field
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOptionsResponse {
    pub enabled: bool,
    pub options: Vec<OptionItem>,
    /// Resolved endpoint for remote option lists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub visible_fields: Vec<String>,
    pub errors: FieldErrors,
    pub resolved_values: FormValues,
    pub resets: Vec<String>,
    pub recomputed: Vec<String>,
    pub options: BTreeMap<String, FieldOptionsResponse>,
}

/// POST /api/form/evaluate
///
/// ```bash
/// curl -X POST http://localhost:3001/api/form/evaluate \
///   -H 'Content-Type: application/json' \
///   -d '{"schema": {...}, "values": {"country": "canada"}, "changed": "country"}'
/// ```
async fn evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, HttpError> {
    let schema: FormSchema = serde_json::from_value(request.schema).map_err(FormServiceError::from)?;
    let resolver = DependencyResolver::with_engine(&schema, state.formula_engine.clone(), &state.config);

    if let Some(changed) = &request.changed {
        if resolver.field(changed).is_none() {
            return Err(FormServiceError::unknown_field(changed.as_str()).into());
        }
    }

    let mut values = schema.initial_values();
    values.extend(request.values);
    let evaluation = resolver.evaluate(&mut values, request.changed.as_deref());

    let options = resolver
        .fields()
        .iter()
        .filter(|f| f.options.is_some() || f.options_map.is_some() || f.options_endpoint.is_some())
        .map(|f| {
            let resolved = resolver.resolve_options(&f.name, &values);
            let endpoint = match &resolved {
                ResolvedOptions::Remote(request) => Some(request.endpoint.clone()),
                _ => None,
            };
            let response = FieldOptionsResponse {
                enabled: resolver.is_enabled(&f.name, &values),
                options: resolved.options().to_vec(),
                endpoint,
            };
            (f.name.clone(), response)
        })
        .collect();

    tracing::debug!(
        fields = resolver.fields().len(),
        errors = evaluation.errors.len(),
        "Evaluated form"
    );

    Ok(Json(EvaluateResponse {
        visible_fields: evaluation.visible_fields,
        errors: evaluation.errors,
        resolved_values: values,
        resets: evaluation.resets,
        recomputed: evaluation.recomputed,
        options,
    }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/form/evaluate", post(evaluate))
        .with_state(state)
}
