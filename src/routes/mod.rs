use std::sync::Arc;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::trace::TraceLayer;
use crate::AppState;

pub mod buca;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
}

/// Full router with state, body limit and request tracing.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_request_size;
    Router::new()
        .merge(routes())
        .merge(buca::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
