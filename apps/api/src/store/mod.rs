//! Package store, the document collection that is the sole source of truth
//! for travel packages.
//!
//! Handlers and the live query adapter only see `Arc<dyn PackageStore>`;
//! `PgPackageStore` backs production, `MemoryPackageStore` backs local runs
//! without a database and the test suite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::FromRow;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::package::Status;

pub mod memory;
pub mod postgres;
#[cfg(test)]
pub mod testing;

pub use memory::MemoryPackageStore;
pub use postgres::PgPackageStore;

/// Collection name used for logging and the change channel.
pub const PACKAGES_COLLECTION: &str = "packages";

/// Capacity of the change fan-out. Slow subscribers lag and resync.
pub const CHANGE_FEED_CAPACITY: usize = 64;

/// Keys a write may never touch.
const RESERVED_KEYS: &[&str] = &["id", "createdAt", "updatedAt"];

/// A raw stored document. `data` is whatever JSON object was last written.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Document {
    pub id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub data: Value,
}

/// Pushed to every subscriber of `PackageStore::changes`.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    /// Something in the collection changed. `id` is set when known.
    Changed { id: Option<Uuid> },
    /// The underlying notification feed broke; subscribers should stop.
    FeedFailed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PackageStore: Send + Sync {
    /// All documents, optionally restricted to one status, newest first.
    async fn list(&self, status: Option<Status>) -> Result<Vec<Document>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Document>, StoreError>;

    /// Inserts a new document and returns the id the store assigned.
    async fn create(&self, fields: Map<String, Value>) -> Result<Uuid, StoreError>;

    /// Merges `fields` into an existing document and refreshes `updated_at`.
    async fn update(&self, id: Uuid, fields: Map<String, Value>) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Receiver for change notifications on the whole collection.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;
}

/// Drops identity and timestamp keys from a write payload.
pub(crate) fn strip_reserved(mut fields: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS {
        fields.remove(*key);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_reserved_keys() {
        let fields = json!({
            "id": "x",
            "createdAt": "2020-01-01",
            "updatedAt": "2020-01-01",
            "title": "Thekkady",
        });
        let Value::Object(map) = fields else {
            unreachable!()
        };
        let stripped = strip_reserved(map);
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped["title"], json!("Thekkady"));
    }
}
