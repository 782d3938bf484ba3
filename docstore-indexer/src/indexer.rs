//! The per-partition indexing loop.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use docstore_index::{extract, IndexEntry, IndexSnapshot, IndexWriter};
use docstore_log::{IngestionLog, LogConsumer};
use docstore_model::{DocumentKind, IngestionEvent, LogRecord};
use docstore_storage::{DocumentStore, RetryPolicy, SnapshotStore};

use crate::errors::IndexerError;

/// Pause after a log poll error before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Configuration for one indexer partition.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Interval between snapshot publications.
    pub publish_interval: Duration,
    /// Publish early once this many events have been applied.
    pub publish_threshold: usize,
    /// Retry policy for payload fetches and snapshot publication.
    pub retry: RetryPolicy,
    /// Number of generations retained when pruning superseded snapshots.
    pub keep_generations: usize,
    /// Consumer group name used on the ingestion log.
    pub group: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_secs(10),
            publish_threshold: 500,
            retry: RetryPolicy::default(),
            keep_generations: 2,
            group: "indexer".to_string(),
        }
    }
}

/// Pipeline phases of one partition's indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerState {
    /// Created but not yet running.
    Idle,
    /// Waiting for the next log record.
    Consuming,
    /// Applying a record to the in-memory index.
    Building,
    /// Publishing a frozen snapshot.
    Publishing,
}

impl fmt::Display for IndexerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexerState::Idle => "idle",
            IndexerState::Consuming => "consuming",
            IndexerState::Building => "building",
            IndexerState::Publishing => "publishing",
        };
        f.write_str(name)
    }
}

/// A document the indexer gave up on after bounded retries.
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    /// Document identifier.
    pub id: String,
    /// Log offset of the event that referenced it.
    pub offset: u64,
    /// Why it was skipped.
    pub error: String,
}

/// Indexer for one partition (document kind).
///
/// Must be the only writer committing generations for its partition;
/// running one indexer task per kind inside one process enforces this.
pub struct Indexer {
    consumer: Box<dyn LogConsumer>,
    core: Core,
}

struct Core {
    kind: DocumentKind,
    documents: DocumentStore,
    snapshots: SnapshotStore,
    writer: IndexWriter,
    state: IndexerState,
    config: IndexerConfig,
    /// Latest published generation; the next publish uses `generation + 1`.
    generation: u64,
    events_since_publish: usize,
    skipped: Vec<SkippedEntry>,
}

impl Indexer {
    /// Subscribe to the partition and position the consumer for resume:
    /// after the latest published snapshot's offset when one exists,
    /// otherwise at the log's earliest retained offset. A resume point that
    /// has fallen out of retention is flagged and clamped to earliest.
    pub async fn start(
        kind: DocumentKind,
        documents: DocumentStore,
        snapshots: SnapshotStore,
        log: &dyn IngestionLog,
        config: IndexerConfig,
    ) -> Result<Self, IndexerError> {
        let mut consumer = log.subscribe(&config.group, &[kind]).await?;

        let (writer, generation) = match snapshots.latest(kind).await? {
            Some(pointer) => {
                let blob = snapshots.fetch(&pointer).await?;
                let snapshot = IndexSnapshot::decode(&blob)?;
                let resume = pointer.built_from_offset.map(|offset| offset + 1).unwrap_or(0);
                let earliest = log.earliest_offset(kind).await?;
                if resume < earliest {
                    warn!(
                        kind = %kind,
                        resume = resume,
                        earliest = earliest,
                        "Resume offset precedes earliest retained offset, events in the gap were lost to log retention"
                    );
                    consumer.seek(kind, earliest).await?;
                } else {
                    consumer.seek(kind, resume).await?;
                }
                info!(
                    kind = %kind,
                    generation = pointer.generation,
                    entries = snapshot.entries.len(),
                    "Resuming from published snapshot"
                );
                (IndexWriter::from_snapshot(snapshot), pointer.generation)
            }
            None => {
                let earliest = log.earliest_offset(kind).await?;
                consumer.seek(kind, earliest).await?;
                info!(kind = %kind, earliest = earliest, "No published snapshot, starting from earliest offset");
                (IndexWriter::new(kind), 0)
            }
        };

        Ok(Self {
            consumer,
            core: Core {
                kind,
                documents,
                snapshots,
                writer,
                state: IndexerState::Idle,
                config,
                generation,
                events_since_publish: 0,
                skipped: Vec::new(),
            },
        })
    }

    /// Partition this indexer owns.
    pub fn kind(&self) -> DocumentKind {
        self.core.kind
    }

    /// Current pipeline phase.
    pub fn state(&self) -> IndexerState {
        self.core.state
    }

    /// Latest published generation (0 before the first publish).
    pub fn generation(&self) -> u64 {
        self.core.generation
    }

    /// Documents given up on after bounded retries.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.core.skipped
    }

    /// Run until `shutdown` fires. Publishes on the configured interval or
    /// after `publish_threshold` applied events, whichever comes first; a
    /// final publish on shutdown flushes pending events.
    #[instrument(skip(self, shutdown), fields(kind = %self.core.kind))]
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), IndexerError> {
        let Self { consumer, core } = self;
        let mut interval = tokio::time::interval(core.config.publish_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Indexer started");
        loop {
            core.transition(IndexerState::Consuming);
            tokio::select! {
                record = consumer.next() => match record {
                    Ok(record) => {
                        core.apply(record).await;
                        if core.events_since_publish >= core.config.publish_threshold {
                            core.publish(consumer.as_mut()).await;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "Error polling the ingestion log");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    }
                },
                _ = interval.tick() => {
                    if core.events_since_publish > 0 {
                        core.publish(consumer.as_mut()).await;
                    }
                }
                _ = shutdown.recv() => {
                    info!("Indexer received shutdown signal");
                    if core.events_since_publish > 0 {
                        core.publish(consumer.as_mut()).await;
                    }
                    return Ok(());
                }
            }
        }
    }
}

impl Core {
    fn transition(&mut self, state: IndexerState) {
        if self.state != state {
            debug!(kind = %self.kind, from = %self.state, to = %state, "Indexer state transition");
            self.state = state;
        }
    }

    /// Apply one log record: fetch the payload by `(kind, id)`, extract
    /// fields, upsert. Failures after bounded retries become skipped
    /// entries; they never stall consumption of subsequent records.
    async fn apply(&mut self, record: LogRecord) {
        self.transition(IndexerState::Building);
        let LogRecord { offset, event } = record;

        let retry = self.config.retry;
        let fetched = retry
            .run("fetch document payload", || {
                self.documents.get(self.kind, &event.id)
            })
            .await;

        let payload = match fetched {
            Ok(payload) => payload,
            Err(err) => {
                self.skip(&event, offset, format!("payload fetch failed: {err}"));
                return;
            }
        };

        match extract(self.kind, &payload) {
            Ok(extracted) => {
                let entry = IndexEntry {
                    digest: event.digest.clone(),
                    fields: extracted.fields,
                };
                debug!(kind = %self.kind, id = %event.id, offset = offset, "Indexed document");
                self.writer.upsert(event.id, entry, offset);
                self.events_since_publish += 1;
            }
            Err(err) => {
                self.skip(&event, offset, format!("field extraction failed: {err}"));
            }
        }
    }

    fn skip(&mut self, event: &IngestionEvent, offset: u64, error: String) {
        warn!(
            kind = %self.kind,
            id = %event.id,
            offset = offset,
            error = %error,
            "Skipping document, indexing continues"
        );
        self.skipped.push(SkippedEntry {
            id: event.id.clone(),
            offset,
            error,
        });
        // The offset still counts as consumed so the resume point advances
        // past the poisoned record.
        self.writer.record_offset(offset);
        self.events_since_publish += 1;
    }

    /// Freeze the writer, publish the next generation, then commit the log
    /// offset the snapshot reflects. On failure the events stay pending and
    /// the next interval retries; the last good generation keeps serving.
    async fn publish(&mut self, consumer: &mut dyn LogConsumer) {
        self.transition(IndexerState::Publishing);
        let generation = self.generation + 1;
        let snapshot = self.writer.snapshot(generation);
        let built_from_offset = snapshot.built_from_offset;

        let blob = match snapshot.encode() {
            Ok(encoded) => Bytes::from(encoded),
            Err(err) => {
                error!(kind = %self.kind, error = %err, "Failed to encode index snapshot");
                return;
            }
        };

        let retry = self.config.retry;
        let published = retry
            .run("publish index snapshot", || {
                self.snapshots
                    .publish(self.kind, generation, built_from_offset, blob.clone())
            })
            .await;

        match published {
            Ok(_) => {
                info!(
                    kind = %self.kind,
                    generation = generation,
                    entries = self.writer.len(),
                    built_from_offset = ?built_from_offset,
                    "Published index snapshot generation"
                );
                self.generation = generation;
                self.events_since_publish = 0;

                if let Some(offset) = built_from_offset {
                    if let Err(err) = consumer.commit(self.kind, offset).await {
                        // At-least-once delivery makes redelivery after a
                        // crash harmless; the upsert is idempotent.
                        warn!(kind = %self.kind, offset = offset, error = %err, "Failed to commit consumed offset");
                    }
                }

                match self
                    .snapshots
                    .prune(self.kind, self.config.keep_generations)
                    .await
                {
                    Ok(0) => {}
                    Ok(removed) => {
                        debug!(kind = %self.kind, removed = removed, "Pruned superseded snapshot generations")
                    }
                    Err(err) => {
                        warn!(kind = %self.kind, error = %err, "Failed to prune superseded snapshots")
                    }
                }
            }
            Err(err) => {
                warn!(
                    kind = %self.kind,
                    generation = generation,
                    error = %err,
                    "Snapshot publication failed, keeping events pending"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docstore_log::MemoryLog;
    use object_store::memory::InMemory;
    use std::sync::Arc;

    struct Env {
        documents: DocumentStore,
        snapshots: SnapshotStore,
        log: MemoryLog,
    }

    fn env() -> Env {
        let backend: Arc<dyn object_store::ObjectStore> = Arc::new(InMemory::new());
        Env {
            documents: DocumentStore::new(backend.clone()),
            snapshots: SnapshotStore::new(backend),
            log: MemoryLog::new(),
        }
    }

    fn config(threshold: usize) -> IndexerConfig {
        IndexerConfig {
            publish_interval: Duration::from_secs(60),
            publish_threshold: threshold,
            retry: RetryPolicy {
                attempts: 2,
                base_delay: Duration::from_millis(10),
            },
            ..IndexerConfig::default()
        }
    }

    fn sbom(name: &str) -> Vec<u8> {
        format!(r#"{{"bomFormat": "CycloneDX", "metadata": {{"component": {{"name": "{name}"}}}}}}"#)
            .into_bytes()
    }

    async fn ingest(env: &Env, id: &str, payload: &[u8]) {
        env.documents
            .put(DocumentKind::Sbom, id, Bytes::copy_from_slice(payload))
            .await
            .unwrap();
        env.log
            .append(IngestionEvent {
                id: id.to_string(),
                kind: DocumentKind::Sbom,
                digest: docstore_storage::ContentDigest::of(payload),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn run_until_generation(env: &Env, indexer: Indexer, generation: u64) -> Indexer {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move {
            let mut indexer = indexer;
            indexer.run(shutdown_rx).await.unwrap();
            indexer
        });

        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                if let Some(pointer) = env.snapshots.latest(DocumentKind::Sbom).await.unwrap() {
                    if pointer.generation >= generation {
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("generation should be published");

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_snapshot_after_threshold() {
        let env = env();
        ingest(&env, "sbom-1", &sbom("alpha")).await;
        ingest(&env, "sbom-2", &sbom("beta")).await;

        let indexer = Indexer::start(
            DocumentKind::Sbom,
            env.documents.clone(),
            env.snapshots.clone(),
            &env.log,
            config(2),
        )
        .await
        .unwrap();
        let indexer = run_until_generation(&env, indexer, 1).await;

        assert_eq!(indexer.generation(), 1);
        assert!(indexer.skipped().is_empty());

        let pointer = env.snapshots.latest(DocumentKind::Sbom).await.unwrap().unwrap();
        assert_eq!(pointer.generation, 1);
        assert_eq!(pointer.built_from_offset, Some(1));

        let snapshot =
            IndexSnapshot::decode(&env.snapshots.fetch(&pointer).await.unwrap()).unwrap();
        assert_eq!(snapshot.entries.len(), 2);
        assert!(snapshot.entries.contains_key("sbom-1"));
        assert!(snapshot.entries.contains_key("sbom-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_events() {
        let env = env();
        ingest(&env, "sbom-1", &sbom("alpha")).await;

        let mut indexer = Indexer::start(
            DocumentKind::Sbom,
            env.documents.clone(),
            env.snapshots.clone(),
            &env.log,
            config(100),
        )
        .await
        .unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move {
            indexer.run(shutdown_rx).await.unwrap();
        });

        // Let the consumer drain the log, then shut down.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let pointer = env.snapshots.latest(DocumentKind::Sbom).await.unwrap().unwrap();
        assert_eq!(pointer.generation, 1);
        assert_eq!(pointer.built_from_offset, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resumes_from_snapshot_offset() {
        let env = env();
        ingest(&env, "sbom-1", &sbom("alpha")).await;
        ingest(&env, "sbom-2", &sbom("beta")).await;

        let indexer = Indexer::start(
            DocumentKind::Sbom,
            env.documents.clone(),
            env.snapshots.clone(),
            &env.log,
            config(2),
        )
        .await
        .unwrap();
        run_until_generation(&env, indexer, 1).await;

        // "Crash": the first indexer is gone; new events arrive, including
        // an overwrite of sbom-2.
        ingest(&env, "sbom-2", &sbom("beta-v2")).await;
        ingest(&env, "sbom-3", &sbom("gamma")).await;

        let restarted = Indexer::start(
            DocumentKind::Sbom,
            env.documents.clone(),
            env.snapshots.clone(),
            &env.log,
            config(2),
        )
        .await
        .unwrap();
        assert_eq!(restarted.generation(), 1);
        run_until_generation(&env, restarted, 2).await;

        let pointer = env.snapshots.latest(DocumentKind::Sbom).await.unwrap().unwrap();
        assert_eq!(pointer.generation, 2);
        assert_eq!(pointer.built_from_offset, Some(3));

        let snapshot =
            IndexSnapshot::decode(&env.snapshots.fetch(&pointer).await.unwrap()).unwrap();
        assert_eq!(snapshot.entries.len(), 3);
        // Last write wins for the overwritten document.
        let fields = &snapshot.entries["sbom-2"].fields;
        assert!(fields.iter().any(|f| f.value == "beta-v2"));
        assert!(!fields.iter().any(|f| f.value == "beta"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_payload_is_skipped_not_fatal() {
        let env = env();
        // Event without a stored payload, then a healthy document.
        env.log
            .append(IngestionEvent {
                id: "ghost".to_string(),
                kind: DocumentKind::Sbom,
                digest: "sha256:ghost".to_string(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
        ingest(&env, "sbom-1", &sbom("alpha")).await;

        let indexer = Indexer::start(
            DocumentKind::Sbom,
            env.documents.clone(),
            env.snapshots.clone(),
            &env.log,
            config(2),
        )
        .await
        .unwrap();
        let indexer = run_until_generation(&env, indexer, 1).await;

        assert_eq!(indexer.skipped().len(), 1);
        assert_eq!(indexer.skipped()[0].id, "ghost");

        let pointer = env.snapshots.latest(DocumentKind::Sbom).await.unwrap().unwrap();
        // The skipped offset is still covered by the resume point.
        assert_eq!(pointer.built_from_offset, Some(1));

        let snapshot =
            IndexSnapshot::decode(&env.snapshots.fetch(&pointer).await.unwrap()).unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert!(snapshot.entries.contains_key("sbom-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncated_log_falls_back_to_earliest() {
        let env = env();
        ingest(&env, "sbom-1", &sbom("alpha")).await;
        ingest(&env, "sbom-2", &sbom("beta")).await;
        ingest(&env, "sbom-3", &sbom("gamma")).await;

        // A published snapshot reflecting only offset 0, while the log has
        // been truncated past the snapshot's resume point.
        let mut writer = IndexWriter::new(DocumentKind::Sbom);
        writer.upsert(
            "sbom-1",
            docstore_index::IndexEntry {
                digest: "sha256:alpha".to_string(),
                fields: Vec::new(),
            },
            0,
        );
        let stale = writer.snapshot(1);
        env.snapshots
            .publish(
                DocumentKind::Sbom,
                stale.generation,
                stale.built_from_offset,
                Bytes::from(stale.encode().unwrap()),
            )
            .await
            .unwrap();
        env.log.truncate(DocumentKind::Sbom, 2);

        let restarted = Indexer::start(
            DocumentKind::Sbom,
            env.documents.clone(),
            env.snapshots.clone(),
            &env.log,
            config(1),
        )
        .await
        .unwrap();
        let restarted = run_until_generation(&env, restarted, 2).await;
        assert_eq!(restarted.generation(), 2);

        // Indexing continued from the earliest retained offset; the event in
        // the retention gap (sbom-2) is lost, the snapshot entry survives.
        let pointer = env.snapshots.latest(DocumentKind::Sbom).await.unwrap().unwrap();
        assert_eq!(pointer.built_from_offset, Some(2));
        let snapshot =
            IndexSnapshot::decode(&env.snapshots.fetch(&pointer).await.unwrap()).unwrap();
        assert!(snapshot.entries.contains_key("sbom-1"));
        assert!(snapshot.entries.contains_key("sbom-3"));
        assert!(!snapshot.entries.contains_key("sbom-2"));
    }
}
