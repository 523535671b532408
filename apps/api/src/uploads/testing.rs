use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{HostError, HostErrorCode, HostRequest, HostedImage, ImageHost, Progress};

/// In-process image host that records every call as `"<strategy>:<key>"`.
#[derive(Default)]
pub struct FakeImageHost {
    calls: Mutex<Vec<String>>,
    chunked_error: Option<HostErrorCode>,
    single_error: Option<HostErrorCode>,
    poison: Option<String>,
}

impl FakeImageHost {
    pub fn chunked_error(mut self, code: HostErrorCode) -> Self {
        self.chunked_error = Some(code);
        self
    }

    pub fn single_error(mut self, code: HostErrorCode) -> Self {
        self.single_error = Some(code);
        self
    }

    /// Rejects any object whose key contains `fragment`.
    pub fn poison(mut self, fragment: &str) -> Self {
        self.poison = Some(fragment.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, strategy: &str, request: &HostRequest) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{strategy}:{}", request.key));
    }

    fn outcome(&self, request: &HostRequest, error: Option<HostErrorCode>) -> Result<HostedImage, HostError> {
        if let Some(code) = error {
            return Err(HostError::new(code, "configured failure"));
        }
        if self
            .poison
            .as_deref()
            .is_some_and(|fragment| request.key.contains(fragment))
        {
            return Err(HostError::new(HostErrorCode::Rejected, "poisoned file"));
        }
        Ok(HostedImage {
            url: format!("https://images.test/{}", request.key),
        })
    }
}

#[async_trait]
impl ImageHost for FakeImageHost {
    async fn upload_chunked(
        &self,
        request: &HostRequest,
        progress: &Progress,
    ) -> Result<HostedImage, HostError> {
        self.record("chunked", request);
        progress.report(50);
        self.outcome(request, self.chunked_error)
    }

    async fn upload_single(&self, request: &HostRequest) -> Result<HostedImage, HostError> {
        self.record("single", request);
        self.outcome(request, self.single_error)
    }
}

/// A real PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}
