//! Store double that counts writes and can be switched into failure.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::package::Status;
use crate::store::{Document, MemoryPackageStore, PackageStore, StoreChange, StoreError};

#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryPackageStore,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn record_write(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()
    }
}

#[async_trait]
impl PackageStore for RecordingStore {
    async fn list(&self, status: Option<Status>) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        self.inner.list(status).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        self.check()?;
        self.inner.get(id).await
    }

    async fn create(&self, fields: Map<String, Value>) -> Result<Uuid, StoreError> {
        self.record_write()?;
        self.inner.create(fields).await
    }

    async fn update(&self, id: Uuid, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.record_write()?;
        self.inner.update(id, fields).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.record_write()?;
        self.inner.delete(id).await
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.changes()
    }
}
