use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::package::Status;
use crate::store::{
    strip_reserved, Document, PackageStore, StoreChange, StoreError, CHANGE_FEED_CAPACITY,
    PACKAGES_COLLECTION,
};

/// Channel the `packages_changed` trigger notifies on.
pub const CHANGE_CHANNEL: &str = "packages_changed";

const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Postgres-backed document store. Each package is one row holding its
/// fields as JSONB; `created_at` / `updated_at` are assigned by the database.
#[derive(Clone)]
pub struct PgPackageStore {
    pool: PgPool,
    changes: broadcast::Sender<StoreChange>,
}

impl PgPackageStore {
    pub fn new(pool: PgPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    /// Starts forwarding `NOTIFY packages_changed` to local subscribers.
    ///
    /// Notifications come from the table trigger, so writes made by other
    /// instances are seen too. Notifications sent while the connection is
    /// down are lost, so once the listener has reconnected it publishes a
    /// payload-less `Changed` and every subscriber re-reads. Errors are
    /// reported as `FeedFailed`.
    pub async fn spawn_change_listener(&self) -> Result<JoinHandle<()>, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        info!("Listening for {PACKAGES_COLLECTION} changes on channel '{CHANGE_CHANNEL}'");

        let changes = self.changes.clone();
        Ok(tokio::spawn(async move {
            loop {
                let mut event = listener.try_recv().await.map(|n| n.map(|n| n.payload().to_string()));
                if let Ok(None) = event {
                    warn!("Change listener lost its connection; reconnecting");
                    // Reconnects and re-issues LISTEN before subscribers re-read
                    if let Err(e) = sqlx::query("SELECT 1").execute(&mut listener).await {
                        event = Err(e);
                    }
                }
                if let Err(e) = &event {
                    warn!("Change listener error: {e}");
                }
                let failed = event.is_err();
                let _ = changes.send(change_for(event));
                if failed {
                    tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                }
            }
        }))
    }
}

/// Maps one listener event (a notification payload, a lost connection, or
/// an error) to what subscribers see.
fn change_for(event: Result<Option<String>, sqlx::Error>) -> StoreChange {
    match event {
        Ok(Some(payload)) => StoreChange::Changed {
            id: Uuid::parse_str(&payload).ok(),
        },
        Ok(None) => StoreChange::Changed { id: None },
        Err(e) => StoreChange::FeedFailed(e.to_string()),
    }
}

#[async_trait]
impl PackageStore for PgPackageStore {
    async fn list(&self, status: Option<Status>) -> Result<Vec<Document>, StoreError> {
        Ok(sqlx::query_as::<_, Document>(
            r#"
            SELECT id, created_at, updated_at, data
            FROM packages
            WHERE ($1::TEXT IS NULL OR data->>'status' = $1)
            ORDER BY created_at DESC NULLS LAST
            "#,
        )
        .bind(status.map(Status::as_str))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(sqlx::query_as::<_, Document>(
            "SELECT id, created_at, updated_at, data FROM packages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create(&self, fields: Map<String, Value>) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO packages (data, created_at, updated_at)
            VALUES ($1, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(Value::Object(strip_reserved(fields)))
        .fetch_one(&self.pool)
        .await?;

        info!("Inserted {PACKAGES_COLLECTION} document {id}");
        Ok(id)
    }

    async fn update(&self, id: Uuid, fields: Map<String, Value>) -> Result<(), StoreError> {
        // `||` merges top-level keys; id and created_at are never written here
        let result = sqlx::query(
            r#"
            UPDATE packages
            SET data = CASE WHEN jsonb_typeof(data) = 'object' THEN data ELSE '{}'::JSONB END || $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Value::Object(strip_reserved(fields)))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!("Updated {PACKAGES_COLLECTION} document {id}");
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM packages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!("Deleted {PACKAGES_COLLECTION} document {id}");
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
