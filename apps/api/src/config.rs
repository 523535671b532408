use std::str::FromStr;

use anyhow::{Context, Result};

use crate::uploads::{DEFAULT_FOLDER, DEFAULT_MAX_BYTES};

/// Application configuration loaded from environment variables.
/// Every backing service is optional; missing ones degrade to in-process
/// fallbacks or disabled features. Malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub s3: Option<S3Config>,
    pub upload_max_bytes: u64,
    pub upload_chunk_bytes: usize,
    pub upload_folder: String,
    pub whatsapp_number: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub session_ttl_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Base of the URLs handed back for uploaded objects.
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            redis_url: optional_env("REDIS_URL"),
            s3: S3Config::from_env(),
            upload_max_bytes: parse_env("UPLOAD_MAX_BYTES", DEFAULT_MAX_BYTES)?,
            upload_chunk_bytes: parse_env("UPLOAD_CHUNK_BYTES", 5 * 1024 * 1024)?,
            upload_folder: optional_env("UPLOAD_FOLDER").unwrap_or_else(|| DEFAULT_FOLDER.to_string()),
            whatsapp_number: optional_env("WHATSAPP_NUMBER"),
            admin_email: optional_env("ADMIN_EMAIL"),
            admin_password: optional_env("ADMIN_PASSWORD"),
            session_ttl_secs: parse_env("SESSION_TTL_SECS", 24 * 60 * 60)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl S3Config {
    /// `None` unless bucket, endpoint and both credentials are all set.
    fn from_env() -> Option<Self> {
        let bucket = optional_env("S3_BUCKET")?;
        let endpoint = optional_env("S3_ENDPOINT")?;
        let access_key_id = optional_env("AWS_ACCESS_KEY_ID")?;
        let secret_access_key = optional_env("AWS_SECRET_ACCESS_KEY")?;
        let public_base_url = optional_env("S3_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("{}/{bucket}", endpoint.trim_end_matches('/')));
        Some(S3Config {
            region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            bucket,
            endpoint,
            access_key_id,
            secret_access_key,
            public_base_url,
        })
    }
}

/// Unset and blank are the same thing.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
