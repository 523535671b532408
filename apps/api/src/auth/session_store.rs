use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;

use super::{AdminSession, SessionError};

const KEY_PREFIX: &str = "explore:session:";

/// Persistence for issued sessions, keyed by bearer token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, token: &str, session: &AdminSession, ttl: Duration) -> Result<(), SessionError>;

    /// `None` for unknown or expired tokens.
    async fn get(&self, token: &str) -> Result<Option<AdminSession>, SessionError>;

    async fn remove(&self, token: &str) -> Result<(), SessionError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

/// Sessions as JSON strings with a Redis TTL.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
}

impl RedisSessionStore {
    pub async fn connect(client: &redis::Client) -> Result<Self, SessionError> {
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis session store connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, token: &str, session: &AdminSession, ttl: Duration) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(format!("{KEY_PREFIX}{token}"))
            .arg(serde_json::to_string(session)?)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<AdminSession>, SessionError> {
        let mut conn = self.conn.clone();
        let raw = redis::cmd("GET")
            .arg(format!("{KEY_PREFIX}{token}"))
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(SessionError::from)
    }

    async fn remove(&self, token: &str) -> Result<(), SessionError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(format!("{KEY_PREFIX}{token}"))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Process-local sessions; expired entries are dropped when read.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, (AdminSession, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, token: &str, session: &AdminSession, ttl: Duration) -> Result<(), SessionError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        // Abandoned tokens are never read again; drop them here
        sessions.retain(|_, (_, expires)| *expires > now);
        sessions.insert(token.to_string(), (session.clone(), now + ttl));
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<AdminSession>, SessionError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(token) {
            Some((session, expires)) if *expires > Instant::now() => Ok(Some(session.clone())),
            Some(_) => {
                sessions.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, token: &str) -> Result<(), SessionError> {
        self.sessions.write().await.remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session() -> AdminSession {
        AdminSession {
            email: "admin@explore.test".to_string(),
            issued_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_sessions_expire() {
        let store = MemorySessionStore::new();
        store.put("t", &session(), Duration::from_secs(60)).await.unwrap();
        assert!(store.get("t").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get("t").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_sweeps_expired_sessions() {
        let store = MemorySessionStore::new();
        store.put("abandoned", &session(), Duration::from_secs(60)).await.unwrap();
        store.put("long", &session(), Duration::from_secs(600)).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        store.put("fresh", &session(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.get("long").await.unwrap().is_some());
        assert!(store.get("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_remove_unknown_is_ok() {
        let store = MemorySessionStore::new();
        store.remove("missing").await.unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
