//! Development HTTP Server Binary
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (port 3001)
//! cargo run --bin dev-server
//!
//! # Custom port
//! DEV_SERVER_PORT=3002 cargo run --bin dev-server
//! ```
//!
//! # Environment Variables
//!
//! - `DEV_SERVER_PORT`: Server port (default: 3001)
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")
//! - `CORS_ALLOW_ORIGIN`: Single allowed browser origin

use std::env;

use formspec_core::FormEngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("FormSpec HTTP Dev Server");

    let port = env::var("DEV_SERVER_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3001);

    tracing::info!("Port: {}", port);

    formspec_dev_tools::dev_server::start_server(FormEngineConfig::default(), port).await?;

    Ok(())
}
