//! Runs the ingestion gateway, query service and indexers in one process.

use std::process::ExitCode;

use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use docstore::{Dependencies, ServiceError};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Service failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServiceError> {
    let deps = Dependencies::new().await?;
    let (shutdown_tx, _) = broadcast::channel(1);

    let mut tasks = Vec::new();
    for mut indexer in deps.indexers {
        let shutdown = shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            let kind = indexer.kind();
            if let Err(err) = indexer.run(shutdown).await {
                error!(kind = %kind, error = %err, "Indexer terminated with error");
            }
        }));
    }
    tasks.push(docstore_api::spawn_refresh(
        deps.state.clone(),
        shutdown_tx.subscribe(),
    ));
    tasks.push({
        let state = deps.state.clone();
        let shutdown = shutdown_tx.subscribe();
        let bind = deps.bind;
        tokio::spawn(async move {
            if let Err(err) = docstore_api::server::run(bind, state, shutdown).await {
                error!(error = %err, "API server terminated with error");
            }
        })
    });

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(());
    for task in tasks {
        let _ = task.await;
    }
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("DOCSTORE_LOG_JSON").is_ok() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
