mod admin;
mod auth;
mod catalog;
mod config;
mod contact;
mod db;
mod errors;
mod models;
mod routes;
mod state;
mod store;
mod uploads;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::{
    AdminCredentials, MemorySessionStore, RedisSessionStore, SessionGuard, SessionStore,
};
use crate::config::{Config, S3Config};
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryPackageStore, PackageStore, PgPackageStore};
use crate::uploads::{ImageHost, ImageUploader, S3ImageHost};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Explore API v{}", env!("CARGO_PKG_VERSION"));

    // Package store: PostgreSQL when configured, in-process otherwise
    let store: Arc<dyn PackageStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            let store = PgPackageStore::new(pool);
            store.spawn_change_listener().await?;
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; packages are kept in memory and lost on restart");
            Arc::new(MemoryPackageStore::new())
        }
    };

    // Sessions: Redis when configured, in-process otherwise
    let session_store: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            Arc::new(RedisSessionStore::connect(&client).await?)
        }
        None => {
            warn!("REDIS_URL not set; admin sessions are kept in memory");
            Arc::new(MemorySessionStore::new())
        }
    };
    let credentials = match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => Some(AdminCredentials {
            email: email.clone(),
            password: password.clone(),
        }),
        _ => {
            warn!("ADMIN_EMAIL / ADMIN_PASSWORD not set; admin login is disabled");
            None
        }
    };
    let sessions = SessionGuard::new(
        session_store,
        credentials,
        Duration::from_secs(config.session_ttl_secs),
    );

    // Image host: S3 / MinIO when configured, uploads disabled otherwise
    let host: Option<Arc<dyn ImageHost>> = match &config.s3 {
        Some(s3) => {
            let client = build_s3_client(s3).await;
            info!("S3 client initialized (bucket: {})", s3.bucket);
            let host: Arc<dyn ImageHost> = Arc::new(S3ImageHost::new(
                client,
                s3.bucket.clone(),
                s3.public_base_url.clone(),
                config.upload_chunk_bytes,
            ));
            Some(host)
        }
        None => {
            warn!("S3 not configured; image uploads are disabled");
            None
        }
    };
    let uploader = ImageUploader::new(host, config.upload_max_bytes, config.upload_folder.clone());

    if config.whatsapp_number.is_none() {
        warn!("WHATSAPP_NUMBER not set; contact links point at the contact page");
    }

    // Build app state
    let state = AppState {
        store,
        uploader,
        sessions,
        whatsapp_number: config.whatsapp_number.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.access_key_id,
        &config.secret_access_key,
        None,
        None,
        "explore-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.endpoint)
        .load()
        .await;

    // MinIO needs path-style addressing
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
