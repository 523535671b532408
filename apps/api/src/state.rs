use std::sync::Arc;

use crate::auth::SessionGuard;
use crate::store::PackageStore;
use crate::uploads::ImageUploader;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The package collection. Postgres in production, in-memory otherwise.
    pub store: Arc<dyn PackageStore>,
    pub uploader: ImageUploader,
    pub sessions: SessionGuard,
    /// Business WhatsApp number; `None` sends contact links to the contact page.
    pub whatsapp_number: Option<String>,
}

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;

    use super::AppState;
    use crate::auth::{AdminCredentials, MemorySessionStore, SessionGuard, DEFAULT_SESSION_TTL};
    use crate::store::PackageStore;
    use crate::uploads::{ImageHost, ImageUploader, DEFAULT_FOLDER, DEFAULT_MAX_BYTES};

    pub const ADMIN_EMAIL: &str = "admin@explore.test";
    pub const ADMIN_PASSWORD: &str = "backwaters";
    pub const WHATSAPP_NUMBER: &str = "+91 98765 43210";

    /// State over in-process backends with known admin credentials.
    pub fn state(store: Arc<dyn PackageStore>, host: Option<Arc<dyn ImageHost>>) -> AppState {
        AppState {
            store,
            uploader: ImageUploader::new(host, DEFAULT_MAX_BYTES, DEFAULT_FOLDER),
            sessions: SessionGuard::new(
                Arc::new(MemorySessionStore::new()),
                Some(AdminCredentials {
                    email: ADMIN_EMAIL.to_string(),
                    password: ADMIN_PASSWORD.to_string(),
                }),
                DEFAULT_SESSION_TTL,
            ),
            whatsapp_number: Some(WHATSAPP_NUMBER.to_string()),
        }
    }
}
