use anyhow::Result;
use std::sync::Arc;

use buca_aggregator::{config, logging, routes, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging("info")?;

    // Load configuration
    let config = config::load_config()?;
    let addr = config.bind_addr;

    let state = Arc::new(AppState::new(config));
    let app = routes::app(state);

    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
