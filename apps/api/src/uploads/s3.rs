use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, warn};

use super::{HostError, HostErrorCode, HostRequest, HostedImage, ImageHost, Progress};

/// S3 rejects multipart parts below this size, except the last one.
pub const MIN_PART_BYTES: usize = 5 * 1024 * 1024;

/// Image host backed by an S3-compatible bucket (AWS or MinIO).
///
/// Chunked uploads use the multipart API. The SDK retries transient failures
/// itself, so one that still surfaces is reported as `RetryLimitExceeded`.
#[derive(Clone)]
pub struct S3ImageHost {
    client: S3Client,
    bucket: String,
    public_base_url: String,
    part_bytes: usize,
}

impl S3ImageHost {
    pub fn new(client: S3Client, bucket: String, public_base_url: String, part_bytes: usize) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            part_bytes: part_bytes.max(MIN_PART_BYTES),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }

    async fn upload_parts(
        &self,
        request: &HostRequest,
        upload_id: &str,
        progress: &Progress,
    ) -> Result<(), HostError> {
        let total = request.bytes.len();
        let mut parts = Vec::new();
        let mut offset = 0;
        let mut part_number = 1;

        while offset < total || parts.is_empty() {
            let end = (offset + self.part_bytes).min(total);
            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(&request.key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(request.bytes.slice(offset..end)))
                .send()
                .await
                .map_err(|e| host_error(&e, HostErrorCode::RetryLimitExceeded))?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            debug!(key = %request.key, part_number, "Uploaded part");
            progress.report_fraction(end as u64, total.max(1) as u64);

            offset = end;
            part_number += 1;
        }

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&request.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| host_error(&e, HostErrorCode::RetryLimitExceeded))?;
        Ok(())
    }
}

#[async_trait]
impl ImageHost for S3ImageHost {
    async fn upload_chunked(
        &self,
        request: &HostRequest,
        progress: &Progress,
    ) -> Result<HostedImage, HostError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&request.key)
            .content_type(&request.content_type)
            .send()
            .await
            .map_err(|e| host_error(&e, HostErrorCode::RetryLimitExceeded))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| HostError::new(HostErrorCode::Unknown, "S3 returned no upload id"))?
            .to_string();

        if let Err(e) = self.upload_parts(request, &upload_id, progress).await {
            if let Err(abort) = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(&request.key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!(key = %request.key, "Failed to abort multipart upload: {}", DisplayErrorContext(&abort));
            }
            return Err(e);
        }

        Ok(HostedImage {
            url: self.public_url(&request.key),
        })
    }

    async fn upload_single(&self, request: &HostRequest) -> Result<HostedImage, HostError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&request.key)
            .body(ByteStream::from(request.bytes.clone()))
            .content_type(&request.content_type)
            .send()
            .await
            .map_err(|e| host_error(&e, HostErrorCode::Unknown))?;

        Ok(HostedImage {
            url: self.public_url(&request.key),
        })
    }
}

/// Maps an SDK failure to a host error. `transient` is the code used for
/// timeouts, dispatch failures and throttling.
fn host_error<E, R>(err: &SdkError<E, R>, transient: HostErrorCode) -> HostError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            transient
        }
        SdkError::ServiceError(service) => classify_code(service.err().code(), transient),
        _ => HostErrorCode::Unknown,
    };
    HostError::new(code, DisplayErrorContext(err).to_string())
}

fn classify_code(code: Option<&str>, transient: HostErrorCode) -> HostErrorCode {
    match code {
        Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken") => {
            HostErrorCode::Unauthorized
        }
        Some("EntityTooLarge" | "EntityTooSmall" | "InvalidArgument" | "InvalidRequest" | "InvalidPart") => {
            HostErrorCode::Rejected
        }
        Some("SlowDown" | "InternalError" | "ServiceUnavailable" | "RequestTimeout") => transient,
        _ => HostErrorCode::Unknown,
    }
}
