//! Live queries: standing subscriptions over the package collection.
//!
//! Every change notification triggers a reload of the *full* matching set,
//! which is normalized, sorted newest-first and delivered as one snapshot.
//! Consumers never see diffs, so lagging or coalescing notifications loses
//! nothing: the next snapshot is always complete.
//!
//! Cancellation is a `CancellationToken`; `cancel()` may be called any number
//! of times and dropping the `Subscription` cancels it too.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::package::{sort_newest_first, PackageRecord, Status};
use crate::store::{PackageStore, StoreChange, StoreError};

/// Featured packages shown on the home page.
pub const FEATURED_LIMIT: usize = 6;

const SUBSCRIPTION_BUFFER: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    /// `None` lists every status (admin views).
    pub status: Option<Status>,
    pub limit: Option<usize>,
}

impl CatalogQuery {
    pub fn public() -> Self {
        Self {
            status: Some(Status::Active),
            limit: None,
        }
    }

    pub fn featured() -> Self {
        Self {
            status: Some(Status::Active),
            limit: Some(FEATURED_LIMIT),
        }
    }

    pub fn admin() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    Snapshot(Vec<PackageRecord>),
    /// Terminal. Nothing is delivered after it.
    Failed(String),
}

/// One-shot read of the current matching set.
pub async fn load_snapshot(
    store: &dyn PackageStore,
    query: &CatalogQuery,
) -> Result<Vec<PackageRecord>, StoreError> {
    let documents = store.list(query.status).await?;
    let mut records: Vec<PackageRecord> = documents
        .iter()
        .map(PackageRecord::from_document)
        .filter(|record| query.status.map_or(true, |status| record.status == status))
        .collect();
    sort_newest_first(&mut records);
    if let Some(limit) = query.limit {
        records.truncate(limit);
    }
    Ok(records)
}

pub struct Subscription {
    events: mpsc::Receiver<SnapshotEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Next snapshot, or `None` once cancelled or after the terminal failure.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Adapts the subscription into a stream. Dropping the stream cancels it.
    pub fn into_stream(self) -> impl Stream<Item = SnapshotEvent> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            let event = subscription.next().await?;
            Some((event, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens a subscription. The first event is the initial load.
pub fn subscribe(store: Arc<dyn PackageStore>, query: CatalogQuery) -> Subscription {
    let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
    let cancel = CancellationToken::new();
    // subscribe before the initial load so no change slips between the two
    let changes = store.changes();
    tokio::spawn(run_subscription(store, query, changes, tx, cancel.clone()));
    Subscription { events: rx, cancel }
}

async fn run_subscription(
    store: Arc<dyn PackageStore>,
    query: CatalogQuery,
    mut changes: broadcast::Receiver<StoreChange>,
    tx: mpsc::Sender<SnapshotEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = match load_snapshot(store.as_ref(), &query).await {
            Ok(records) => {
                debug!(count = records.len(), "Delivering package snapshot");
                SnapshotEvent::Snapshot(records)
            }
            Err(e) => {
                warn!("Package snapshot failed: {e}");
                SnapshotEvent::Failed(e.to_string())
            }
        };
        let terminal = matches!(event, SnapshotEvent::Failed(_));
        if !deliver(&tx, &cancel, event).await || terminal {
            return;
        }

        match wait_for_change(&mut changes, &cancel).await {
            ChangeWait::Reload => continue,
            ChangeWait::Failed(reason) => {
                warn!("Package change feed failed: {reason}");
                deliver(&tx, &cancel, SnapshotEvent::Failed(reason)).await;
                return;
            }
            ChangeWait::Cancelled => return,
        }
    }
}

async fn deliver(
    tx: &mpsc::Sender<SnapshotEvent>,
    cancel: &CancellationToken,
    event: SnapshotEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}

enum ChangeWait {
    Reload,
    Failed(String),
    Cancelled,
}

async fn wait_for_change(
    changes: &mut broadcast::Receiver<StoreChange>,
    cancel: &CancellationToken,
) -> ChangeWait {
    let first = tokio::select! {
        biased;
        _ = cancel.cancelled() => return ChangeWait::Cancelled,
        change = changes.recv() => change,
    };

    let mut outcome = classify(first);
    // one reload covers everything already queued
    while let ChangeWait::Reload = outcome {
        match changes.try_recv() {
            Ok(change) => outcome = classify(Ok(change)),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => {
                outcome = ChangeWait::Failed("change feed closed".to_string());
            }
        }
    }
    outcome
}

fn classify(change: Result<StoreChange, RecvError>) -> ChangeWait {
    match change {
        Ok(StoreChange::Changed { .. }) => ChangeWait::Reload,
        Err(RecvError::Lagged(skipped)) => {
            debug!(skipped, "Subscription lagged behind change feed; reloading");
            ChangeWait::Reload
        }
        Ok(StoreChange::FeedFailed(reason)) => ChangeWait::Failed(reason),
        Err(RecvError::Closed) => ChangeWait::Failed("change feed closed".to_string()),
    }
}
