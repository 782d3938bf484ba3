//! Kafka-backed ingestion log.
//!
//! One topic per document kind (`sbom-stored`, `vex-stored`), each with a
//! single partition so the per-kind ordering guarantee holds. Events are
//! JSON-encoded. Consumer offsets are committed manually, after the
//! consumer has durably applied the records (at-least-once).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info};

use docstore_model::{DocumentKind, IngestionEvent, LogRecord};

use crate::errors::LogError;
use crate::{IngestionLog, LogConsumer};

/// Partition used within each per-kind topic.
const PARTITION: i32 = 0;

/// Timeout for blocking metadata and seek operations.
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

fn topic(kind: DocumentKind) -> String {
    format!("{kind}-stored")
}

fn kind_for_topic(topic: &str) -> Option<DocumentKind> {
    topic.strip_suffix("-stored").and_then(|name| name.parse().ok())
}

/// Kafka-backed ingestion log.
pub struct KafkaLog {
    brokers: String,
    producer: FutureProducer,
    metadata: BaseConsumer,
}

impl KafkaLog {
    /// Connect to the given bootstrap brokers.
    pub fn new(brokers: &str) -> Result<Self, LogError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| LogError::backend(e.to_string()))?;

        let metadata: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", "docstore-log-metadata")
            .create()
            .map_err(|e| LogError::backend(e.to_string()))?;

        info!(brokers = %brokers, "Created Kafka ingestion log");
        Ok(Self {
            brokers: brokers.to_string(),
            producer,
            metadata,
        })
    }

    fn watermarks(&self, kind: DocumentKind) -> Result<(i64, i64), LogError> {
        self.metadata
            .fetch_watermarks(&topic(kind), PARTITION, METADATA_TIMEOUT)
            .map_err(|e| LogError::backend(e.to_string()))
    }
}

#[async_trait]
impl IngestionLog for KafkaLog {
    async fn append(&self, event: IngestionEvent) -> Result<u64, LogError> {
        let payload = serde_json::to_vec(&event).map_err(|e| LogError::encoding(e.to_string()))?;
        let topic = topic(event.kind);
        let record = FutureRecord::to(&topic).key(&event.id).payload(&payload);

        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .map_err(|(err, _)| LogError::backend(err.to_string()))?;

        debug!(topic = %topic, partition = partition, offset = offset, "Appended ingestion event");
        Ok(offset as u64)
    }

    async fn subscribe(
        &self,
        group: &str,
        kinds: &[DocumentKind],
    ) -> Result<Box<dyn LogConsumer>, LogError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| LogError::backend(e.to_string()))?;

        let mut assignment = TopicPartitionList::new();
        let mut topics = HashMap::new();
        for kind in kinds {
            let topic = topic(*kind);
            assignment
                .add_partition_offset(&topic, PARTITION, Offset::Invalid)
                .map_err(|e| LogError::backend(e.to_string()))?;
            topics.insert(*kind, topic);
        }
        consumer
            .assign(&assignment)
            .map_err(|e| LogError::backend(e.to_string()))?;

        info!(group = %group, topics = ?topics.values().collect::<Vec<_>>(), "Subscribed Kafka consumer");
        Ok(Box::new(KafkaLogConsumer { consumer, topics }))
    }

    async fn earliest_offset(&self, kind: DocumentKind) -> Result<u64, LogError> {
        let (low, _) = self.watermarks(kind)?;
        Ok(low as u64)
    }

    async fn next_offset(&self, kind: DocumentKind) -> Result<u64, LogError> {
        let (_, high) = self.watermarks(kind)?;
        Ok(high as u64)
    }
}

/// Consumer over a [`KafkaLog`].
pub struct KafkaLogConsumer {
    consumer: StreamConsumer,
    topics: HashMap<DocumentKind, String>,
}

impl KafkaLogConsumer {
    fn topic_for(&self, kind: DocumentKind) -> Result<&str, LogError> {
        self.topics
            .get(&kind)
            .map(String::as_str)
            .ok_or(LogError::NotSubscribed(kind))
    }
}

#[async_trait]
impl LogConsumer for KafkaLogConsumer {
    async fn next(&mut self) -> Result<LogRecord, LogError> {
        loop {
            let message = self
                .consumer
                .recv()
                .await
                .map_err(|e| LogError::backend(e.to_string()))?;

            let Some(kind) = kind_for_topic(message.topic()) else {
                debug!(topic = message.topic(), "Ignoring message from unexpected topic");
                continue;
            };
            let Some(payload) = message.payload() else {
                debug!(topic = message.topic(), offset = message.offset(), "Ignoring empty message");
                continue;
            };

            let event: IngestionEvent = serde_json::from_slice(payload)
                .map_err(|e| LogError::encoding(e.to_string()))?;
            if event.kind != kind {
                return Err(LogError::encoding(format!(
                    "event kind {} does not match topic {}",
                    event.kind,
                    message.topic()
                )));
            }

            return Ok(LogRecord {
                offset: message.offset() as u64,
                event,
            });
        }
    }

    async fn seek(&mut self, kind: DocumentKind, offset: u64) -> Result<(), LogError> {
        let topic = self.topic_for(kind)?.to_string();
        self.consumer
            .seek(&topic, PARTITION, Offset::Offset(offset as i64), METADATA_TIMEOUT)
            .map_err(|e| LogError::backend(e.to_string()))
    }

    async fn commit(&mut self, kind: DocumentKind, offset: u64) -> Result<(), LogError> {
        let topic = self.topic_for(kind)?.to_string();
        let mut commit = TopicPartitionList::new();
        commit
            .add_partition_offset(&topic, PARTITION, Offset::Offset(offset as i64 + 1))
            .map_err(|e| LogError::backend(e.to_string()))?;
        self.consumer
            .commit(&commit, CommitMode::Async)
            .map_err(|e| LogError::backend(e.to_string()))
    }

    async fn committed(&mut self, kind: DocumentKind) -> Result<Option<u64>, LogError> {
        let topic = self.topic_for(kind)?.to_string();
        let committed = self
            .consumer
            .committed(METADATA_TIMEOUT)
            .map_err(|e| LogError::backend(e.to_string()))?;
        let offset = committed
            .find_partition(&topic, PARTITION)
            .map(|entry| entry.offset());
        // Kafka stores the next offset to consume; the contract reports the
        // last processed one.
        match offset {
            Some(Offset::Offset(next)) if next > 0 => Ok(Some(next as u64 - 1)),
            _ => Ok(None),
        }
    }
}
