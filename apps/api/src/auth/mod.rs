//! Admin sessions.
//!
//! Credentials are checked on the server and never leave it. A successful
//! login yields an opaque bearer token whose session lives in a
//! `SessionStore` until it expires or the admin logs out.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub mod handlers;
pub mod middleware;
pub mod session_store;

pub use session_store::{MemorySessionStore, RedisSessionStore, SessionStore};

/// Where the admin UI sends unauthenticated visitors.
pub const LOGIN_REDIRECT: &str = "/admin/login";

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("session backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for SessionError {
    fn from(e: redis::RedisError) -> Self {
        SessionError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Backend(e.to_string())
    }
}

/// What a valid token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub email: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct SessionGuard {
    store: Arc<dyn SessionStore>,
    credentials: Option<AdminCredentials>,
    ttl: Duration,
}

impl SessionGuard {
    /// Without credentials every login is rejected.
    pub fn new(store: Arc<dyn SessionStore>, credentials: Option<AdminCredentials>, ttl: Duration) -> Self {
        Self {
            store,
            credentials,
            ttl,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, SessionError> {
        let Some(credentials) = &self.credentials else {
            warn!("Admin login attempted but no admin credentials are configured");
            return Err(SessionError::InvalidCredentials);
        };

        let email_ok = constant_time_eq(
            email.trim().to_ascii_lowercase().as_bytes(),
            credentials.email.to_ascii_lowercase().as_bytes(),
        );
        let password_ok = constant_time_eq(password.as_bytes(), credentials.password.as_bytes());
        if !(email_ok & password_ok) {
            warn!("Rejected admin login");
            return Err(SessionError::InvalidCredentials);
        }

        let token = Uuid::new_v4().simple().to_string();
        let session = AdminSession {
            email: credentials.email.clone(),
            issued_at: Utc::now(),
        };
        self.store.put(&token, &session, self.ttl).await?;
        info!("Admin signed in");

        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero());
        Ok(IssuedSession {
            token,
            expires_at: session.issued_at + ttl,
            email: session.email,
        })
    }

    /// Idempotent; unknown tokens are fine.
    pub async fn logout(&self, token: &str) -> Result<(), SessionError> {
        self.store.remove(token).await?;
        info!("Admin signed out");
        Ok(())
    }

    pub async fn authenticate(&self, token: &str) -> Result<AdminSession, SessionError> {
        if token.is_empty() {
            return Err(SessionError::Unauthenticated);
        }
        self.store
            .get(token)
            .await?
            .ok_or(SessionError::Unauthenticated)
    }
}

/// Compares SHA-256 digests so neither content nor length short-circuits.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let (a, b) = (Sha256::digest(a), Sha256::digest(b));
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
