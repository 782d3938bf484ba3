//! HTTP routing.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{auth, ingest, query};

/// Build the service router. Document routes sit behind the bearer-token
/// middleware; `/health` does not.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/v1/:resource",
            post(ingest::publish_document).get(query::lookup_document),
        )
        .route("/api/v1/:resource/search", get(query::search_documents))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
