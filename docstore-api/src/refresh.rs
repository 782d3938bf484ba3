//! Query-side index refresh.
//!
//! Searchers read an immutable [`SearchIndex`] behind an [`ArcSwap`]; the
//! background refresh task is the pointer's sole writer. A request that
//! loaded generation N keeps its handle and completes against it even if
//! N+1 is swapped in mid-request — no locks are held beyond the pointer
//! swap itself.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use docstore_index::{IndexSnapshot, SearchIndex};
use docstore_model::DocumentKind;

use crate::state::AppState;

/// The currently loaded index for one kind.
pub struct LoadedIndex {
    /// Loaded snapshot generation, `None` before the first load.
    pub generation: Option<u64>,
    /// The immutable index serving searches.
    pub index: SearchIndex,
}

impl LoadedIndex {
    fn empty(kind: DocumentKind) -> Self {
        Self {
            generation: None,
            index: SearchIndex::empty(kind),
        }
    }
}

/// Per-kind atomically swapped index handles.
pub struct SearchHandles {
    sbom: ArcSwap<LoadedIndex>,
    vex: ArcSwap<LoadedIndex>,
}

impl SearchHandles {
    /// Create handles holding empty indexes.
    pub fn new() -> Self {
        Self {
            sbom: ArcSwap::from_pointee(LoadedIndex::empty(DocumentKind::Sbom)),
            vex: ArcSwap::from_pointee(LoadedIndex::empty(DocumentKind::Vex)),
        }
    }

    fn slot(&self, kind: DocumentKind) -> &ArcSwap<LoadedIndex> {
        match kind {
            DocumentKind::Sbom => &self.sbom,
            DocumentKind::Vex => &self.vex,
        }
    }

    /// Snapshot of the current handle; stays valid after later swaps.
    pub fn load(&self, kind: DocumentKind) -> Arc<LoadedIndex> {
        self.slot(kind).load_full()
    }

    /// Atomically replace the handle for `kind`.
    pub fn install(&self, kind: DocumentKind, loaded: LoadedIndex) {
        self.slot(kind).store(Arc::new(loaded));
    }
}

impl Default for SearchHandles {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the background task polling the snapshot store on the configured
/// interval and swapping in newer generations.
pub fn spawn_refresh(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    refresh_once(&state).await;
                }
                _ = shutdown.recv() => {
                    debug!("Index refresh task shutting down");
                    return;
                }
            }
        }
    })
}

/// One refresh pass over all kinds. Failures leave the last good
/// generation in place — staleness grows, correctness does not.
pub async fn refresh_once(state: &AppState) {
    for kind in DocumentKind::ALL {
        refresh_kind(state, kind).await;
    }
}

async fn refresh_kind(state: &AppState, kind: DocumentKind) {
    let pointer = match state.snapshots.latest(kind).await {
        Ok(Some(pointer)) => pointer,
        Ok(None) => return,
        Err(err) => {
            warn!(kind = %kind, error = %err, "Failed to poll latest snapshot");
            return;
        }
    };

    let current = state.search.load(kind);
    if current
        .generation
        .is_some_and(|generation| generation >= pointer.generation)
    {
        return;
    }

    let blob = match state.snapshots.fetch(&pointer).await {
        Ok(blob) => blob,
        Err(err) => {
            warn!(kind = %kind, generation = pointer.generation, error = %err, "Failed to fetch snapshot blob");
            return;
        }
    };
    let snapshot = match IndexSnapshot::decode(&blob) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(kind = %kind, generation = pointer.generation, error = %err, "Failed to decode snapshot blob");
            return;
        }
    };

    let index = SearchIndex::build(&snapshot);
    info!(
        kind = %kind,
        generation = pointer.generation,
        entries = index.len(),
        "Loaded new index generation"
    );
    state.search.install(
        kind,
        LoadedIndex {
            generation: Some(pointer.generation),
            index,
        },
    );
}
