use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::models::package::Status;
use crate::store::{
    strip_reserved, Document, PackageStore, StoreChange, StoreError, CHANGE_FEED_CAPACITY,
};

/// In-process store with the same contract as the Postgres one.
/// Insertion order is kept so equal timestamps list deterministically.
pub struct MemoryPackageStore {
    documents: RwLock<Vec<Document>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryPackageStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            documents: RwLock::new(Vec::new()),
            changes,
        }
    }

    /// Inserts a document verbatim, bypassing normalization. Used to seed
    /// legacy or malformed data.
    pub async fn insert_raw(&self, document: Document) {
        let id = document.id;
        self.documents.write().await.push(document);
        self.notify(Some(id));
    }

    fn notify(&self, id: Option<Uuid>) {
        // no receivers is fine
        let _ = self.changes.send(StoreChange::Changed { id });
    }
}

#[cfg(test)]
impl MemoryPackageStore {
    pub fn fail_feed(&self, reason: &str) {
        let _ = self.changes.send(StoreChange::FeedFailed(reason.to_string()));
    }
}

impl Default for MemoryPackageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageStore for MemoryPackageStore {
    async fn list(&self, status: Option<Status>) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.read().await;
        let mut matching: Vec<Document> = documents
            .iter()
            .filter(|doc| match status {
                Some(status) => doc.data.get("status").and_then(Value::as_str) == Some(status.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|doc| doc.id == id).cloned())
    }

    async fn create(&self, fields: Map<String, Value>) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.documents.write().await.push(Document {
            id,
            created_at: Some(now),
            updated_at: Some(now),
            data: Value::Object(strip_reserved(fields)),
        });
        debug!("Created document {id} in memory store");
        self.notify(Some(id));
        Ok(id)
    }

    async fn update(&self, id: Uuid, fields: Map<String, Value>) -> Result<(), StoreError> {
        {
            let mut documents = self.documents.write().await;
            let doc = documents
                .iter_mut()
                .find(|doc| doc.id == id)
                .ok_or(StoreError::NotFound(id))?;
            if !doc.data.is_object() {
                doc.data = Value::Object(Map::new());
            }
            if let Value::Object(existing) = &mut doc.data {
                existing.extend(strip_reserved(fields));
            }
            doc.updated_at = Some(Utc::now());
        }
        self.notify(Some(id));
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        {
            let mut documents = self.documents.write().await;
            let position = documents
                .iter()
                .position(|doc| doc.id == id)
                .ok_or(StoreError::NotFound(id))?;
            documents.remove(position);
        }
        self.notify(Some(id));
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
