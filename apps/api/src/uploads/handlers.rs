use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;
use crate::uploads::{
    GalleryOutcome, ImageFile, Progress, UploadError, UploadOutcome, UploadStrategy,
    MAX_GALLERY_FILES,
};

const COVER_PATH: &str = "packages/covers";
const GALLERY_PATH: &str = "packages/gallery";

#[derive(Debug, Default, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub strategy: UploadStrategy,
    /// Sub-folder under the configured upload folder.
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    pub enabled: bool,
    pub max_bytes: u64,
    pub max_gallery_files: usize,
}

/// GET /api/v1/admin/uploads/status
pub async fn handle_upload_status(State(state): State<AppState>) -> Json<UploadStatusResponse> {
    Json(UploadStatusResponse {
        enabled: state.uploader.is_enabled(),
        max_bytes: state.uploader.max_bytes(),
        max_gallery_files: MAX_GALLERY_FILES,
    })
}

/// POST /api/v1/admin/uploads/cover
/// Multipart with one `file` field.
pub async fn handle_upload_cover(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadOutcome>), AppError> {
    let file = read_files(multipart, state.uploader.max_bytes(), 1)
        .await?
        .pop()
        .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    let path = params.path.as_deref().unwrap_or(COVER_PATH);
    let result = state
        .uploader
        .upload(&file, path, params.strategy, &Progress::detached())
        .await;

    Ok((
        outcome_status(result.as_ref().err()),
        Json(UploadOutcome::from(&result)),
    ))
}

/// POST /api/v1/admin/uploads/gallery
/// Multipart with one or more `files` fields, uploaded in order.
pub async fn handle_upload_gallery(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<GalleryOutcome>), AppError> {
    let files = read_files(multipart, state.uploader.max_bytes(), MAX_GALLERY_FILES).await?;
    if files.is_empty() {
        return Err(AppError::Validation("No files provided".to_string()));
    }

    let path = params.path.as_deref().unwrap_or(GALLERY_PATH);
    let result = state
        .uploader
        .upload_gallery(&files, path, params.strategy, &Progress::detached())
        .await;

    Ok((
        outcome_status(result.as_ref().err().map(|failure| &failure.error)),
        Json(GalleryOutcome::from(&result)),
    ))
}

fn outcome_status(error: Option<&UploadError>) -> StatusCode {
    match error {
        None => StatusCode::OK,
        Some(UploadError::Disabled) => StatusCode::SERVICE_UNAVAILABLE,
        Some(e) if e.is_rejection() => StatusCode::UNPROCESSABLE_ENTITY,
        Some(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Collects the file fields of a multipart body.
///
/// At most `max_bytes + 1` bytes of each file are kept; the rest is drained.
/// An oversized file therefore still fails the uploader's size check without
/// being buffered in full.
async fn read_files(
    mut multipart: Multipart,
    max_bytes: u64,
    max_files: usize,
) -> Result<Vec<ImageFile>, AppError> {
    let malformed = |e: axum::extract::multipart::MultipartError| AppError::Validation(e.body_text());
    let cap = usize::try_from(max_bytes.saturating_add(1)).unwrap_or(usize::MAX);
    let mut files = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        if !matches!(field.name(), Some("file" | "files" | "files[]")) {
            continue;
        }
        if files.len() == max_files {
            return Err(AppError::Validation(format!(
                "At most {max_files} file(s) per upload"
            )));
        }

        let file_name = field.file_name().unwrap_or("image").to_string();
        let content_type = field.content_type().map(str::to_string);
        let mut buf = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            let room = cap.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }
        files.push(ImageFile::new(file_name, content_type, buf.freeze()));
    }

    Ok(files)
}
