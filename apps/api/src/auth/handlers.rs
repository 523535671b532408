use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;

use crate::auth::middleware::AuthenticatedAdmin;
use crate::auth::{AdminSession, IssuedSession};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/v1/admin/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<IssuedSession>, AppError> {
    Ok(Json(state.sessions.login(&body.email, &body.password).await?))
}

/// POST /api/v1/admin/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedAdmin>,
) -> Result<StatusCode, AppError> {
    state.sessions.logout(&admin.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/session
pub async fn handle_session(Extension(admin): Extension<AuthenticatedAdmin>) -> Json<AdminSession> {
    Json(admin.session)
}
