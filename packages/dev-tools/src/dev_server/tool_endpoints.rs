//! Mask and Formula Playground Endpoints
//!
//! # Endpoints
//!
//! - `POST /api/mask/apply` - Format raw input with a mask
//! - `POST /api/formula/evaluate` - Evaluate a formula over a variable bag
//! - `GET /api/health` - Liveness check

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use formspec_core::{apply_mask, is_complete, max_length, pattern_of, MaskSpec};
use formspec_formula::{Value, Variables};
use serde::{Deserialize, Serialize};

use crate::dev_server::{AppState, HttpError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskRequest {
    pub raw: String,
    /// Preset name or `{"type": "custom", "pattern": ...}`; absent means identity
    #[serde(default)]
    pub mask: Option<MaskSpec>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskResponse {
    pub formatted: String,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaRequest {
    pub formula: String,
    #[serde(default)]
    pub variables: Variables,
}

#[derive(Debug, Serialize)]
pub struct FormulaResponse {
    pub value: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub cached_formulas: usize,
}

/// POST /api/mask/apply
async fn apply(Json(request): Json<MaskRequest>) -> Json<MaskResponse> {
    let mask = request.mask.as_ref();
    let formatted = apply_mask(&request.raw, mask);
    Json(MaskResponse {
        complete: is_complete(&formatted, mask),
        max_length: max_length(mask),
        pattern: pattern_of(mask),
        formatted,
    })
}

/// POST /api/formula/evaluate
async fn evaluate_formula(
    State(state): State<AppState>,
    Json(request): Json<FormulaRequest>,
) -> Result<Json<FormulaResponse>, HttpError> {
    let value = state
        .formula_engine
        .evaluate(&request.formula, &request.variables)?;
    Ok(Json(FormulaResponse { value }))
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        cached_formulas: state.formula_engine.cached_formulas(),
    })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/mask/apply", post(apply))
        .route("/api/formula/evaluate", post(evaluate_formula))
        .route("/api/health", get(health))
        .with_state(state)
}
