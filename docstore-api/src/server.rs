//! HTTP server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Bind and serve until `shutdown` fires. In-flight requests complete
/// before the server returns.
pub async fn run(
    addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
