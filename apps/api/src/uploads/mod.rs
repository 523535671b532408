//! Image uploads to the external image host.
//!
//! `ImageUploader` owns everything that happens before and around the network
//! call: size and type checks, object naming, dimension probing and the
//! strategy choice. Dimensions are best-effort; formats the decoder does not
//! know (SVG, HEIC, AVIF) still upload, just without `width` / `height`. A chunked (multipart) transfer is preferred because it
//! reports real progress; if it gives up with `retry_limit_exceeded` the same
//! bytes are sent again as a single request, which only reports 0 and 100.
//!
//! Errors never escape as panics; every path ends in `UploadedImage` or
//! `UploadError`.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod handlers;
pub mod progress;
pub mod s3;
#[cfg(test)]
pub mod testing;

pub use progress::Progress;
pub use s3::S3ImageHost;

pub const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_FOLDER: &str = "explore-my-kerala";
pub const MAX_GALLERY_FILES: usize = 20;

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    pub fn declared_size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStrategy {
    #[default]
    Chunked,
    Single,
}

/// Machine-readable host failure, used to pick the fallback strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostErrorCode {
    RetryLimitExceeded,
    Unauthorized,
    Rejected,
    Unknown,
}

impl HostErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            HostErrorCode::RetryLimitExceeded => "retry_limit_exceeded",
            HostErrorCode::Unauthorized => "unauthorized",
            HostErrorCode::Rejected => "rejected",
            HostErrorCode::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for HostErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct HostError {
    pub code: HostErrorCode,
    pub message: String,
}

impl HostError {
    pub fn new(code: HostErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HostRequest {
    pub key: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct HostedImage {
    pub url: String,
}

/// The image hosting service. `S3ImageHost` in production.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Resumable transfer in parts, reporting progress as parts complete.
    async fn upload_chunked(
        &self,
        request: &HostRequest,
        progress: &Progress,
    ) -> Result<HostedImage, HostError>;

    /// Whole file in one request.
    async fn upload_single(&self, request: &HostRequest) -> Result<HostedImage, HostError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Error)]
pub enum UploadError {
    #[error("Image uploads are not configured")]
    Disabled,

    #[error("File size must be less than {}MB", .max / (1024 * 1024))]
    TooLarge { size: u64, max: u64 },

    #[error("Please select a valid image file (got {content_type})")]
    NotAnImage { content_type: String },

    #[error("Upload failed: {0}")]
    Host(#[from] HostError),
}

impl UploadError {
    /// Rejected locally, before any network call.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            UploadError::TooLarge { .. } | UploadError::NotAnImage { .. }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Disabled => "uploads_disabled",
            UploadError::TooLarge { .. } => "file_too_large",
            UploadError::NotAnImage { .. } => "not_an_image",
            UploadError::Host(e) => e.code.as_str(),
        }
    }
}

/// A gallery batch stopped at `position` (1-based). Earlier files were
/// uploaded but are not handed back, so the batch adds nothing to a draft.
#[derive(Debug, Clone, Error)]
#[error("Image {position} of {total} failed: {error}")]
pub struct GalleryFailure {
    pub position: usize,
    pub total: usize,
    pub error: UploadError,
}

/// JSON shape of a single upload result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadOutcome {
    pub success: bool,
    #[serde(flatten)]
    pub image: Option<UploadedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl From<&Result<UploadedImage, UploadError>> for UploadOutcome {
    fn from(result: &Result<UploadedImage, UploadError>) -> Self {
        match result {
            Ok(image) => Self {
                success: true,
                image: Some(image.clone()),
                error: None,
                code: None,
            },
            Err(e) => Self {
                success: false,
                image: None,
                error: Some(e.to_string()),
                code: Some(e.code()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryOutcome {
    pub success: bool,
    pub images: Vec<UploadedImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl From<&Result<Vec<UploadedImage>, GalleryFailure>> for GalleryOutcome {
    fn from(result: &Result<Vec<UploadedImage>, GalleryFailure>) -> Self {
        match result {
            Ok(images) => Self {
                success: true,
                images: images.clone(),
                failed_position: None,
                error: None,
                code: None,
            },
            Err(failure) => Self {
                success: false,
                images: Vec::new(),
                failed_position: Some(failure.position),
                error: Some(failure.to_string()),
                code: Some(failure.error.code()),
            },
        }
    }
}

#[derive(Clone)]
pub struct ImageUploader {
    host: Option<Arc<dyn ImageHost>>,
    max_bytes: u64,
    folder: String,
}

impl ImageUploader {
    /// `host: None` disables uploads; every call then fails with `Disabled`.
    pub fn new(host: Option<Arc<dyn ImageHost>>, max_bytes: u64, folder: impl Into<String>) -> Self {
        Self {
            host,
            max_bytes,
            folder: folder.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.host.is_some()
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Local checks on what the client declared. Returns the content type to
    /// upload with.
    pub fn validate(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        declared_size: u64,
    ) -> Result<String, UploadError> {
        if declared_size > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: declared_size,
                max: self.max_bytes,
            });
        }
        let content_type = resolve_content_type(file_name, content_type);
        if !content_type.starts_with("image/") {
            return Err(UploadError::NotAnImage { content_type });
        }
        Ok(content_type)
    }

    pub async fn upload(
        &self,
        file: &ImageFile,
        path_hint: &str,
        strategy: UploadStrategy,
        progress: &Progress,
    ) -> Result<UploadedImage, UploadError> {
        let host = self.host.as_ref().ok_or(UploadError::Disabled)?;
        let content_type = self.validate(
            &file.file_name,
            file.content_type.as_deref(),
            file.declared_size(),
        )?;
        let dimensions = image_dimensions(&file.bytes);
        if dimensions.is_none() {
            debug!(file = %file.file_name, "Could not read image dimensions; uploading anyway");
        }

        let request = HostRequest {
            key: self.object_key(path_hint, &file.file_name),
            content_type,
            bytes: file.bytes.clone(),
        };

        progress.report(0);
        let hosted = match strategy {
            UploadStrategy::Chunked => match host.upload_chunked(&request, progress).await {
                Ok(hosted) => hosted,
                Err(e) if e.code == HostErrorCode::RetryLimitExceeded => {
                    warn!(key = %request.key, "Chunked upload gave up ({e}); retrying as single request");
                    host.upload_single(&request).await?
                }
                Err(e) => return Err(e.into()),
            },
            UploadStrategy::Single => host.upload_single(&request).await?,
        };
        progress.report(100);

        info!(key = %request.key, ?dimensions, "Uploaded image");
        Ok(UploadedImage {
            url: hosted.url,
            width: dimensions.map(|(width, _)| width),
            height: dimensions.map(|(_, height)| height),
        })
    }

    /// Uploads files one after another. Progress is the share of completed
    /// files; the first failure stops the batch.
    pub async fn upload_gallery(
        &self,
        files: &[ImageFile],
        path_hint: &str,
        strategy: UploadStrategy,
        progress: &Progress,
    ) -> Result<Vec<UploadedImage>, GalleryFailure> {
        let total = files.len();
        let mut uploaded = Vec::with_capacity(total);
        for (index, file) in files.iter().enumerate() {
            match self.upload(file, path_hint, strategy, &Progress::detached()).await {
                Ok(image) => {
                    uploaded.push(image);
                    progress.report_fraction(uploaded.len() as u64, total as u64);
                }
                Err(error) => {
                    warn!("Gallery upload stopped at file {} of {total}: {error}", index + 1);
                    return Err(GalleryFailure {
                        position: index + 1,
                        total,
                        error,
                    });
                }
            }
        }
        Ok(uploaded)
    }

    fn object_key(&self, path_hint: &str, file_name: &str) -> String {
        let name = format!("{}-{}", Utc::now().timestamp_millis(), sanitize(file_name));
        [self.folder.as_str(), path_hint]
            .iter()
            .flat_map(|part| part.split('/'))
            .map(sanitize)
            .filter(|segment| !segment.is_empty())
            .chain(std::iter::once(name))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// The declared type wins unless it is missing or generic; then the file
/// extension decides.
fn resolve_content_type(file_name: &str, declared: Option<&str>) -> String {
    match declared
        .map(str::trim)
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
    {
        Some(ct) => ct.to_ascii_lowercase(),
        None => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// `None` for anything the decoder cannot size.
fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

fn sanitize(segment: &str) -> String {
    segment
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}
