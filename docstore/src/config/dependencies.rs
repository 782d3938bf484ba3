//! Dependency initialization and wiring for the docstore services.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use tracing::info;

use docstore_api::{ApiConfig, AppState, NoopAuthenticator};
use docstore_indexer::{Indexer, IndexerConfig};
use docstore_log::{IngestionLog, MemoryLog};
use docstore_model::DocumentKind;
use docstore_storage::{DocumentStore, SnapshotStore, StorageError};

use crate::ServiceError;

/// Default socket address for the HTTP API.
const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Default interval between indexer snapshot publications, in seconds.
const DEFAULT_PUBLISH_INTERVAL_SECS: u64 = 10;

/// Default event count that triggers an early snapshot publication.
const DEFAULT_PUBLISH_THRESHOLD: usize = 500;

/// Default interval between query-side snapshot polls, in seconds.
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5;

/// Default maximum canonical payload size, in bytes.
const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 64 * 1024 * 1024;

fn env_parsed<T>(name: &str, default: T) -> Result<T, ServiceError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|err| ServiceError::config(format!("Invalid {name}: {err}"))),
        Err(_) => Ok(default),
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Socket address the API binds to.
    pub bind: SocketAddr,
    /// Shared handler state for the gateway and query service.
    pub state: Arc<AppState>,
    /// One indexer per partition, positioned for resume and ready to run.
    pub indexers: Vec<Indexer>,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DOCSTORE_BIND`: API socket address (default: 127.0.0.1:8080)
    /// - `DOCSTORE_STORAGE_PATH`: local filesystem storage root; when unset
    ///   an in-memory store is used (devmode)
    /// - `DOCSTORE_PUBLISH_INTERVAL_SECS`: indexer publish interval (default: 10)
    /// - `DOCSTORE_PUBLISH_THRESHOLD`: events triggering an early publish (default: 500)
    /// - `DOCSTORE_REFRESH_INTERVAL_SECS`: query refresh poll interval (default: 5)
    /// - `DOCSTORE_MAX_PAYLOAD_BYTES`: maximum canonical payload size (default: 64 MiB)
    /// - `DOCSTORE_KAFKA_BROKERS`: Kafka bootstrap servers for the ingestion
    ///   log (only with the `kafka` feature; defaults to the in-memory log)
    pub async fn new() -> Result<Self, ServiceError> {
        let bind: SocketAddr = env_parsed("DOCSTORE_BIND", DEFAULT_BIND.parse().map_err(|err| {
            ServiceError::config(format!("Invalid default bind address: {err}"))
        })?)?;
        let publish_interval = Duration::from_secs(env_parsed(
            "DOCSTORE_PUBLISH_INTERVAL_SECS",
            DEFAULT_PUBLISH_INTERVAL_SECS,
        )?);
        let publish_threshold =
            env_parsed("DOCSTORE_PUBLISH_THRESHOLD", DEFAULT_PUBLISH_THRESHOLD)?;
        let refresh_interval = Duration::from_secs(env_parsed(
            "DOCSTORE_REFRESH_INTERVAL_SECS",
            DEFAULT_REFRESH_INTERVAL_SECS,
        )?);
        let max_payload_bytes =
            env_parsed("DOCSTORE_MAX_PAYLOAD_BYTES", DEFAULT_MAX_PAYLOAD_BYTES)?;

        info!(
            bind = %bind,
            publish_interval_secs = publish_interval.as_secs(),
            refresh_interval_secs = refresh_interval.as_secs(),
            "Initializing dependencies"
        );

        let backend: Arc<dyn ObjectStore> = match env::var("DOCSTORE_STORAGE_PATH") {
            Ok(path) => {
                std::fs::create_dir_all(&path)?;
                info!(path = %path, "Using local filesystem storage");
                Arc::new(LocalFileSystem::new_with_prefix(&path).map_err(StorageError::from)?)
            }
            Err(_) => {
                info!("DOCSTORE_STORAGE_PATH not set, using in-memory storage (devmode)");
                Arc::new(InMemory::new())
            }
        };
        let documents = DocumentStore::new(backend.clone());
        let snapshots = SnapshotStore::new(backend);

        let log = Self::ingestion_log()?;

        let mut indexers = Vec::new();
        for kind in DocumentKind::ALL {
            let config = IndexerConfig {
                publish_interval,
                publish_threshold,
                ..IndexerConfig::default()
            };
            indexers.push(
                Indexer::start(
                    kind,
                    documents.clone(),
                    snapshots.clone(),
                    log.as_ref(),
                    config,
                )
                .await?,
            );
        }
        info!(partitions = indexers.len(), "Indexers positioned for resume");

        // Token validation is the identity collaborator's job; the devmode
        // authenticator passes every request through.
        let api_config = ApiConfig {
            max_payload_bytes,
            refresh_interval,
            ..ApiConfig::default()
        };
        let state = Arc::new(AppState::new(
            documents,
            snapshots,
            log,
            Arc::new(NoopAuthenticator),
            api_config,
        ));

        Ok(Self {
            bind,
            state,
            indexers,
        })
    }

    #[cfg(feature = "kafka")]
    fn ingestion_log() -> Result<Arc<dyn IngestionLog>, ServiceError> {
        match env::var("DOCSTORE_KAFKA_BROKERS") {
            Ok(brokers) => {
                info!(brokers = %brokers, "Using Kafka ingestion log");
                Ok(Arc::new(docstore_log::kafka::KafkaLog::new(&brokers)?))
            }
            Err(_) => {
                info!("DOCSTORE_KAFKA_BROKERS not set, using in-memory ingestion log");
                Ok(Arc::new(MemoryLog::new()))
            }
        }
    }

    #[cfg(not(feature = "kafka"))]
    fn ingestion_log() -> Result<Arc<dyn IngestionLog>, ServiceError> {
        info!("Using in-memory ingestion log");
        Ok(Arc::new(MemoryLog::new()))
    }
}
