//! Development-only HTTP server for browser testing
//!
//! Exposes the form engine over JSON so schema authors can exercise
//! validation, evaluation, masks and formulas from a browser or `curl`
//! without embedding the core.
//!
//! # Architecture
//!
//! The dev server is organized into modular endpoint modules:
//! - `schema_endpoints`: schema validation and import
//! - `form_endpoints`: resolver passes over posted values
//! - `tool_endpoints`: mask and formula playgrounds, health check
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin dev-server
//! DEV_SERVER_PORT=3002 RUST_LOG=debug cargo run --bin dev-server
//! ```
//!
//! # Security
//!
//! - CORS restricted to localhost origins (override with `CORS_ALLOW_ORIGIN`)
//! - No authentication (local development only)

use axum::{
    http::{header, Method},
    Router,
};
use formspec_core::FormEngineConfig;
use formspec_formula::FormulaEngine;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod form_endpoints;
mod http_error;
mod schema_endpoints;
mod tool_endpoints;

pub use http_error::HttpError;

/// Application state shared across all endpoints
///
/// One formula engine is shared so its compiled-formula cache stays warm
/// across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FormEngineConfig>,
    pub formula_engine: Arc<FormulaEngine>,
}

impl AppState {
    pub fn new(config: FormEngineConfig) -> anyhow::Result<Self> {
        config.validate().map_err(anyhow::Error::msg)?;
        let formula_engine = FormulaEngine::new(config.formula.clone())?;
        Ok(Self {
            config: Arc::new(config),
            formula_engine: Arc::new(formula_engine),
        })
    }
}

/// Create the main application router with all endpoint modules
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(schema_endpoints::routes(state.clone()))
        .merge(form_endpoints::routes(state.clone()))
        .merge(tool_endpoints::routes(state))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// CORS layer for local frontends
///
/// Default origins cover the usual Vite ports; `CORS_ALLOW_ORIGIN` replaces
/// them with a single origin.
fn cors_layer() -> CorsLayer {
    let default_origins = [
        "http://localhost:1420",
        "http://localhost:5173",
        "http://localhost:3000",
    ];

    let configured: Vec<String> = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(origin) => vec![origin],
        Err(_) => default_origins.iter().map(|o| o.to_string()).collect(),
    };

    let origins: Vec<header::HeaderValue> = configured
        .iter()
        .filter_map(|origin| match origin.parse::<header::HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_credentials(false)
}

/// Start the HTTP dev server on `127.0.0.1:port`
pub async fn start_server(config: FormEngineConfig, port: u16) -> anyhow::Result<()> {
    let app = create_router(AppState::new(config)?);

    let addr = format!("127.0.0.1:{}", port);
    tracing::info!("FormSpec dev server starting on http://{}", addr);
    tracing::info!("Development mode only - NOT for production use");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
