use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::admin::draft::{DraftOp, PackageDraft};
use crate::admin::form::{AdminForm, SubmitOutcome};
use crate::catalog::live::{load_snapshot, subscribe, CatalogQuery};
use crate::catalog::snapshot_sse;
use crate::errors::AppError;
use crate::models::package::{PackageRecord, Status};
use crate::state::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PackageCounts {
    pub total: usize,
    pub active: usize,
    pub draft: usize,
}

#[derive(Debug, Serialize)]
pub struct AdminListResponse {
    pub packages: Vec<PackageRecord>,
    pub counts: PackageCounts,
}

impl From<Vec<PackageRecord>> for AdminListResponse {
    fn from(packages: Vec<PackageRecord>) -> Self {
        let count = |status| packages.iter().filter(|p| p.status == status).count();
        let counts = PackageCounts {
            total: packages.len(),
            active: count(Status::Active),
            draft: count(Status::Draft),
        };
        Self { packages, counts }
    }
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    #[serde(flatten)]
    pub outcome: SubmitOutcome,
    pub package: PackageRecord,
}

#[derive(Debug, Deserialize)]
pub struct ApplyOpsRequest {
    #[serde(default)]
    pub draft: PackageDraft,
    pub ops: Vec<DraftOp>,
}

/// GET /api/v1/admin/packages
pub async fn handle_list_packages(
    State(state): State<AppState>,
) -> Result<Json<AdminListResponse>, AppError> {
    let records = load_snapshot(state.store.as_ref(), &CatalogQuery::admin()).await?;
    Ok(Json(records.into()))
}

/// GET /api/v1/admin/packages/stream
pub async fn handle_stream_packages(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = subscribe(state.store.clone(), CatalogQuery::admin());
    snapshot_sse(subscription, AdminListResponse::from)
}

/// GET /api/v1/admin/packages/new/draft
pub async fn handle_new_draft() -> Json<PackageDraft> {
    Json(AdminForm::create().draft().clone())
}

/// GET /api/v1/admin/packages/:id/draft
pub async fn handle_get_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PackageDraft>, AppError> {
    let form = AdminForm::load(state.store.as_ref(), id).await?;
    Ok(Json(form.draft().clone()))
}

/// POST /api/v1/admin/drafts/apply
/// Runs a batch of edit operations against a draft; all or nothing.
pub async fn handle_apply_ops(
    Json(req): Json<ApplyOpsRequest>,
) -> Result<Json<PackageDraft>, AppError> {
    Ok(Json(req.draft.apply_all(&req.ops)?))
}

/// POST /api/v1/admin/packages
pub async fn handle_create_package(
    State(state): State<AppState>,
    Json(draft): Json<PackageDraft>,
) -> Result<(StatusCode, Json<SaveResponse>), AppError> {
    let mut form = AdminForm::create();
    form.replace_draft(draft)?;
    let response = save(&state, &mut form).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// PUT /api/v1/admin/packages/:id
pub async fn handle_update_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(draft): Json<PackageDraft>,
) -> Result<Json<SaveResponse>, AppError> {
    let mut form = AdminForm::load(state.store.as_ref(), id).await?;
    form.replace_draft(draft)?;
    Ok(Json(save(&state, &mut form).await?))
}

/// DELETE /api/v1/admin/packages/:id
pub async fn handle_delete_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete(id).await?;
    info!("Package {id} deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn save(state: &AppState, form: &mut AdminForm) -> Result<SaveResponse, AppError> {
    let outcome = form.submit(state.store.as_ref()).await?;
    let document = state
        .store
        .get(outcome.id())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Package {} not found", outcome.id())))?;
    Ok(SaveResponse {
        outcome,
        package: PackageRecord::from_document(&document),
    })
}
