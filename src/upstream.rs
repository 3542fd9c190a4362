//! Upstream image capability and its OpenAI implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

/// Resolution requested from every upstream operation.
pub const IMAGE_SIZE: &str = "1024x1024";
/// Images requested per call.
pub const IMAGE_COUNT: u32 = 1;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const GENERATION_MODEL: &str = "dall-e-3";
const GENERATION_QUALITY: &str = "standard";
const GENERATION_STYLE: &str = "vivid";

/// The three upstream image capabilities. Each returns a URL at which the
/// produced image can be downloaded.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Generates a new image from a text prompt.
    async fn generate_from_text(&self, prompt: &str) -> Result<String, UpstreamError>;

    /// Produces a variation of an existing image.
    async fn create_variation(&self, image: Vec<u8>) -> Result<String, UpstreamError>;

    /// Edits an image within the region selected by `mask`.
    async fn edit_with_mask(
        &self,
        image: Vec<u8>,
        mask: Vec<u8>,
        prompt: &str,
    ) -> Result<String, UpstreamError>;
}

/// Builder for [`OpenAiImageService`].
#[derive(Debug, Clone)]
pub struct OpenAiImageServiceBuilder {
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl Default for OpenAiImageServiceBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl OpenAiImageServiceBuilder {
    /// Sets the API key. Required.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API root, e.g. for a proxy.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the service. Fails when no usable API key was given.
    pub fn build(self) -> Result<OpenAiImageService, UpstreamError> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| UpstreamError::Auth("no API key provided".into()))?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(OpenAiImageService {
            client,
            api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// [`ImageService`] backed by the OpenAI Images API.
pub struct OpenAiImageService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiImageService {
    /// Creates a new builder.
    pub fn builder() -> OpenAiImageServiceBuilder {
        OpenAiImageServiceBuilder::default()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn submit(&self, request: reqwest::RequestBuilder) -> Result<String, UpstreamError> {
        let response = request.bearer_auth(&self.api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, retry_after));
        }

        let body: ImagesResponse = response.json().await?;
        body.into_first_url().ok_or(UpstreamError::MissingImageUrl)
    }
}

#[async_trait]
impl ImageService for OpenAiImageService {
    async fn generate_from_text(&self, prompt: &str) -> Result<String, UpstreamError> {
        let body = GenerationBody {
            model: GENERATION_MODEL,
            prompt,
            n: IMAGE_COUNT,
            size: IMAGE_SIZE,
            quality: GENERATION_QUALITY,
            style: GENERATION_STYLE,
        };
        let request = self
            .client
            .post(self.endpoint("images/generations"))
            .json(&body);
        self.submit(request).await
    }

    async fn create_variation(&self, image: Vec<u8>) -> Result<String, UpstreamError> {
        let form = Form::new()
            .part("image", png_part(image, "image.png")?)
            .text("n", IMAGE_COUNT.to_string())
            .text("size", IMAGE_SIZE);
        let request = self
            .client
            .post(self.endpoint("images/variations"))
            .multipart(form);
        self.submit(request).await
    }

    async fn edit_with_mask(
        &self,
        image: Vec<u8>,
        mask: Vec<u8>,
        prompt: &str,
    ) -> Result<String, UpstreamError> {
        let form = Form::new()
            .part("image", png_part(image, "image.png")?)
            .part("mask", png_part(mask, "mask.png")?)
            .text("prompt", prompt.to_string())
            .text("n", IMAGE_COUNT.to_string())
            .text("size", IMAGE_SIZE);
        let request = self.client.post(self.endpoint("images/edits")).multipart(form);
        self.submit(request).await
    }
}

fn png_part(bytes: Vec<u8>, file_name: &'static str) -> Result<Part, UpstreamError> {
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("image/png")
        .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))
}

fn parse_error(status: u16, text: &str, retry_after: Option<Duration>) -> UpstreamError {
    let message = serde_json::from_str::<ApiErrorResponse>(text)
        .map(|body| body.error.message)
        .unwrap_or_else(|_| text.chars().take(500).collect());

    match status {
        401 | 403 => UpstreamError::Auth(message),
        429 => UpstreamError::RateLimited { retry_after },
        _ => UpstreamError::Api { status, message },
    }
}

#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    model: &'static str,
    prompt: &'a str,
    n: u32,
    size: &'static str,
    quality: &'static str,
    style: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

impl ImagesResponse {
    fn into_first_url(self) -> Option<String> {
        self.data
            .into_iter()
            .next()
            .and_then(|image| image.url)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
