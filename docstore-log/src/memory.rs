//! In-memory ingestion log.
//!
//! Used by tests and devmode. Preserves the contract the services rely on:
//! per-partition ordering, monotonic offsets, at-least-once delivery, and
//! per-group committed offsets, for the lifetime of the process. Retention
//! can be simulated with [`MemoryLog::truncate`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::Notify;

use docstore_model::{DocumentKind, IngestionEvent, LogRecord};

use crate::errors::LogError;
use crate::{IngestionLog, LogConsumer};

#[derive(Default)]
struct Partition {
    base_offset: u64,
    events: Vec<IngestionEvent>,
}

impl Partition {
    fn next_offset(&self) -> u64 {
        self.base_offset + self.events.len() as u64
    }

    fn get(&self, offset: u64) -> Option<&IngestionEvent> {
        offset
            .checked_sub(self.base_offset)
            .and_then(|index| self.events.get(index as usize))
    }
}

#[derive(Default)]
struct Shared {
    partitions: RwLock<HashMap<DocumentKind, Partition>>,
    committed: RwLock<HashMap<(String, DocumentKind), u64>>,
    notify: Notify,
}

/// In-memory partitioned ingestion log.
#[derive(Clone, Default)]
pub struct MemoryLog {
    shared: Arc<Shared>,
}

impl MemoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all events below `offset` in a partition, simulating log
    /// retention. Consumers positioned inside the dropped range skip
    /// forward to the new earliest offset.
    pub fn truncate(&self, kind: DocumentKind, offset: u64) {
        let mut partitions = self.shared.partitions.write().unwrap();
        let partition = partitions.entry(kind).or_default();
        if offset <= partition.base_offset {
            return;
        }
        let count = (offset - partition.base_offset).min(partition.events.len() as u64);
        partition.events.drain(..count as usize);
        partition.base_offset += count;
    }
}

#[async_trait]
impl IngestionLog for MemoryLog {
    async fn append(&self, event: IngestionEvent) -> Result<u64, LogError> {
        let offset = {
            let mut partitions = self.shared.partitions.write().unwrap();
            let partition = partitions.entry(event.kind).or_default();
            let offset = partition.next_offset();
            partition.events.push(event);
            offset
        };
        self.shared.notify.notify_waiters();
        Ok(offset)
    }

    async fn subscribe(
        &self,
        group: &str,
        kinds: &[DocumentKind],
    ) -> Result<Box<dyn LogConsumer>, LogError> {
        let partitions = self.shared.partitions.read().unwrap();
        let committed = self.shared.committed.read().unwrap();
        let mut positions = HashMap::new();
        for kind in kinds {
            let position = committed
                .get(&(group.to_string(), *kind))
                .map(|offset| offset + 1)
                .unwrap_or_else(|| {
                    partitions
                        .get(kind)
                        .map(|partition| partition.base_offset)
                        .unwrap_or(0)
                });
            positions.insert(*kind, position);
        }
        Ok(Box::new(MemoryLogConsumer {
            shared: self.shared.clone(),
            group: group.to_string(),
            positions,
        }))
    }

    async fn earliest_offset(&self, kind: DocumentKind) -> Result<u64, LogError> {
        let partitions = self.shared.partitions.read().unwrap();
        Ok(partitions
            .get(&kind)
            .map(|partition| partition.base_offset)
            .unwrap_or(0))
    }

    async fn next_offset(&self, kind: DocumentKind) -> Result<u64, LogError> {
        let partitions = self.shared.partitions.read().unwrap();
        Ok(partitions
            .get(&kind)
            .map(Partition::next_offset)
            .unwrap_or(0))
    }
}

/// Consumer over a [`MemoryLog`].
pub struct MemoryLogConsumer {
    shared: Arc<Shared>,
    group: String,
    positions: HashMap<DocumentKind, u64>,
}

impl MemoryLogConsumer {
    fn poll(&mut self) -> Option<LogRecord> {
        let partitions = self.shared.partitions.read().unwrap();
        for (kind, position) in self.positions.iter_mut() {
            let Some(partition) = partitions.get(kind) else {
                continue;
            };
            // Skip forward over a truncated range.
            if *position < partition.base_offset {
                *position = partition.base_offset;
            }
            if let Some(event) = partition.get(*position) {
                let record = LogRecord {
                    offset: *position,
                    event: event.clone(),
                };
                *position += 1;
                return Some(record);
            }
        }
        None
    }
}

#[async_trait]
impl LogConsumer for MemoryLogConsumer {
    async fn next(&mut self) -> Result<LogRecord, LogError> {
        loop {
            if let Some(record) = self.poll() {
                return Ok(record);
            }
            let shared = self.shared.clone();
            let notified = shared.notify.notified();
            // Re-check to close the race with an append between poll and wait.
            if let Some(record) = self.poll() {
                return Ok(record);
            }
            notified.await;
        }
    }

    async fn seek(&mut self, kind: DocumentKind, offset: u64) -> Result<(), LogError> {
        if !self.positions.contains_key(&kind) {
            return Err(LogError::NotSubscribed(kind));
        }
        self.positions.insert(kind, offset);
        Ok(())
    }

    async fn commit(&mut self, kind: DocumentKind, offset: u64) -> Result<(), LogError> {
        if !self.positions.contains_key(&kind) {
            return Err(LogError::NotSubscribed(kind));
        }
        let mut committed = self.shared.committed.write().unwrap();
        let entry = committed.entry((self.group.clone(), kind)).or_insert(offset);
        *entry = (*entry).max(offset);
        Ok(())
    }

    async fn committed(&mut self, kind: DocumentKind) -> Result<Option<u64>, LogError> {
        let committed = self.shared.committed.read().unwrap();
        Ok(committed.get(&(self.group.clone(), kind)).copied())
    }
}
