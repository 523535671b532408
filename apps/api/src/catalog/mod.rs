//! Public package catalog: live snapshots, category filter and search.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::catalog::live::{SnapshotEvent, Subscription};
use crate::models::package::PackageRecord;

pub mod filter;
pub mod handlers;
pub mod live;

/// Serves a subscription as server-sent events.
///
/// Each snapshot becomes a `snapshot` event carrying `project(records)` as
/// JSON; a feed failure becomes one `error` event, after which the stream
/// ends. Dropping the response drops the subscription, which cancels it.
pub fn snapshot_sse<T, F>(
    subscription: Subscription,
    mut project: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + 'static,
    F: FnMut(Vec<PackageRecord>) -> T + Send + 'static,
{
    let events = subscription.into_stream().map(move |event| {
        Ok(match event {
            SnapshotEvent::Snapshot(records) => {
                debug!(count = records.len(), "Delivering snapshot");
                Event::default()
                    .event("snapshot")
                    .json_data(project(records))
                    .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
            }
            SnapshotEvent::Failed(message) => Event::default().event("error").data(message),
        })
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
