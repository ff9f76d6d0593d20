//! Plexus synchronization controller.
//!
//! Orchestrates bulk load then steady-state event application over the
//! resource graph: one connection, one single-writer loop, snapshots
//! published via arc-swap, topology-changed notifications via a watch
//! channel epoch.

#![forbid(unsafe_code)]

use std::sync::Arc;

use arc_swap::ArcSwap;
use metrics::{counter, gauge};
use plexus_core::{Link, Resource, TopologySnapshot, WatchEvent, NIL_UID};
use plexus_graph::{apply_event, LinkSet, ResourceStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Errors surfaced to `connect()` callers and suitable for transport later.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum SyncError {
    #[error("bulk_load: {0}")]
    BulkLoad(String),
    #[error("subscribe: {0}")]
    Subscribe(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Initial full state from the bulk source. Links are pre-computed by the
/// source with its fuller derivation and trusted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BulkSnapshot {
    pub resources: Vec<Resource>,
    pub links: Vec<Link>,
}

#[async_trait::async_trait]
pub trait BulkLoader: Send + Sync {
    async fn load(&self) -> SyncResult<BulkSnapshot>;
}

#[async_trait::async_trait]
pub trait WatchSource: Send + Sync {
    /// Subscribe to the live per-object event stream. Events are delivered
    /// one at a time, ordered per uid.
    async fn subscribe(&self) -> SyncResult<EventStream>;
}

/// Cancellation handle that aborts the producing task, if any.
pub struct CancelHandle {
    task: Option<tokio::task::JoinHandle<()>>,
}

impl CancelHandle {
    pub fn new(task: Option<tokio::task::JoinHandle<()>>) -> Self {
        Self { task }
    }

    pub fn cancel(&mut self) {
        if let Some(h) = self.task.take() {
            h.abort();
        }
    }
}

/// Event channel handed back by a `WatchSource`.
pub struct EventStream {
    pub rx: mpsc::Receiver<WatchEvent>,
    pub cancel: CancelHandle,
}

fn queue_cap() -> usize {
    std::env::var("PLEXUS_QUEUE_CAP")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(2048)
}

/// Default channel capacity for `WatchSource` implementations
/// (`PLEXUS_QUEUE_CAP`, default 2048).
pub fn event_channel() -> (mpsc::Sender<WatchEvent>, mpsc::Receiver<WatchEvent>) {
    mpsc::channel(queue_cap())
}

fn freeze(epoch: u64, store: &ResourceStore, links: &LinkSet) -> Arc<TopologySnapshot> {
    Arc::new(TopologySnapshot {
        epoch,
        resources: store.all().cloned().collect(),
        links: links.sorted(),
    })
}

/// Live connection to a cluster graph. Owns the single-writer loop; readers
/// only ever see immutable snapshots.
pub struct Session {
    snap: Arc<ArcSwap<TopologySnapshot>>,
    epoch_rx: watch::Receiver<u64>,
    task: Option<tokio::task::JoinHandle<()>>,
    cancel: CancelHandle,
}

impl Session {
    /// Current merged (resources, links) view.
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        self.snap.load_full()
    }

    /// Receiver bumped only when an event actually changed topology.
    /// Cosmetic churn never fires it.
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> {
        self.epoch_rx.clone()
    }

    /// Wait for the event loop to exit (producer done, channel drained).
    /// Intended for replay-style finite sources.
    pub async fn closed(&mut self) {
        if let Some(h) = self.task.take() {
            let _ = h.await;
        }
    }

    /// Tear down the subscription and clear published state. Idempotent;
    /// nothing survives into a later reconnection.
    pub fn disconnect(&mut self) {
        if let Some(h) = self.task.take() {
            h.abort();
        }
        self.cancel.cancel();
        self.snap.store(Arc::new(TopologySnapshot::default()));
        info!("sync: disconnected");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Bulk-load the graph, then spawn the event loop.
///
/// A bulk failure surfaces here and leaves nothing published. Cancellation
/// during the load is the caller dropping this future: the loaded state is
/// discarded with it and no loop is ever spawned.
pub async fn connect(
    loader: &dyn BulkLoader,
    source: &dyn WatchSource,
) -> SyncResult<Session> {
    let t0 = std::time::Instant::now();
    info!("sync: connect start");
    let bulk = loader.load().await?;
    let stream = source.subscribe().await?;

    let mut store = ResourceStore::new();
    let mut links = LinkSet::new();
    store.load(bulk.resources);
    links.load(bulk.links);
    info!(
        resources = store.len(),
        links = links.len(),
        took_ms = %t0.elapsed().as_millis(),
        "sync: bulk load ok"
    );

    let epoch = 1u64;
    let snap = Arc::new(ArcSwap::new(freeze(epoch, &store, &links)));
    let (epoch_tx, epoch_rx) = watch::channel(epoch);
    gauge!("plexus_links_total", links.len() as f64);

    let snap_writer = Arc::clone(&snap);
    let mut rx = stream.rx;
    let task = tokio::spawn(async move {
        let mut epoch = epoch;
        while let Some(event) = rx.recv().await {
            if event.resource.uid == NIL_UID {
                counter!("plexus_events_dropped_total", 1);
                warn!(kind = ?event.kind, "sync: dropping event with nil uid");
                continue;
            }
            let applied = apply_event(event, &mut store, &mut links);
            if applied.changed {
                epoch += 1;
                counter!("plexus_events_applied_total", 1);
                gauge!("plexus_links_total", links.len() as f64);
                snap_writer.store(freeze(epoch, &store, &links));
                let _ = epoch_tx.send(epoch);
            } else {
                // Record replacement must still be visible to pull readers.
                counter!("plexus_events_cosmetic_total", 1);
                snap_writer.store(freeze(epoch, &store, &links));
            }
        }
        debug!("sync: event channel closed; loop exiting");
    });

    Ok(Session {
        snap,
        epoch_rx,
        task: Some(task),
        cancel: stream.cancel,
    })
}
