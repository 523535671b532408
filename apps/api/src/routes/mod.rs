pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::admin::handlers as admin;
use crate::auth::handlers as auth;
use crate::auth::middleware::require_admin;
use crate::catalog::handlers as catalog;
use crate::state::AppState;
use crate::uploads::handlers as uploads;
use crate::uploads::MAX_GALLERY_FILES;

/// Per-file allowance for multipart headers on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let per_file = usize::try_from(state.uploader.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    // Everything here requires a bearer token
    let admin_routes = Router::new()
        .route("/logout", post(auth::handle_logout))
        .route("/session", get(auth::handle_session))
        .route(
            "/packages",
            get(admin::handle_list_packages).post(admin::handle_create_package),
        )
        .route("/packages/stream", get(admin::handle_stream_packages))
        .route("/packages/new/draft", get(admin::handle_new_draft))
        .route(
            "/packages/:id",
            put(admin::handle_update_package).delete(admin::handle_delete_package),
        )
        .route("/packages/:id/draft", get(admin::handle_get_draft))
        .route("/drafts/apply", post(admin::handle_apply_ops))
        .route("/uploads/status", get(uploads::handle_upload_status))
        .route(
            "/uploads/cover",
            post(uploads::handle_upload_cover).layer(DefaultBodyLimit::max(per_file)),
        )
        .route(
            "/uploads/gallery",
            post(uploads::handle_upload_gallery)
                .layer(DefaultBodyLimit::max(per_file.saturating_mul(MAX_GALLERY_FILES))),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health::health_handler))
        // Public catalog
        .route("/api/v1/categories", get(catalog::handle_categories))
        .route("/api/v1/contact", get(catalog::handle_contact))
        .route("/api/v1/packages", get(catalog::handle_list_packages))
        .route("/api/v1/packages/featured", get(catalog::handle_featured_packages))
        .route("/api/v1/packages/stream", get(catalog::handle_stream_packages))
        .route("/api/v1/packages/:id", get(catalog::handle_get_package))
        // Admin
        .route("/api/v1/admin/login", post(auth::handle_login))
        .nest("/api/v1/admin", admin_routes)
        .with_state(state)
}
