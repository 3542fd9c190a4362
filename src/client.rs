//! Client for the studio's generate and edit endpoints.
//!
//! Each call is two round-trips: submit the operation, then download the
//! image at the returned URL and re-encode it as a `data:` URL.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::adapter::ImageRequest;
use crate::encoding;
use crate::error::{ClientError, EncodingError, ErrorBody};

/// Remote image operations as seen by the interaction controller.
#[async_trait]
pub trait ImageOperations: Send + Sync {
    /// Generates from the prompt, or transforms `source` when it is non-empty.
    async fn generate_or_transform(&self, source: &str, prompt: &str)
        -> Result<String, ClientError>;

    /// Edits `source` according to the prompt.
    async fn edit_existing(&self, source: &str, prompt: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Generate,
    Edit,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Self::Generate => "/generate-image",
            Self::Edit => "/edit-image",
        }
    }

    fn failure(self) -> &'static str {
        match self {
            Self::Generate => "Failed to generate image",
            Self::Edit => "Failed to edit image",
        }
    }

    fn fetch_failure(self) -> &'static str {
        match self {
            Self::Generate => "Failed to fetch generated image",
            Self::Edit => "Failed to fetch edited image",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    image_url: Option<String>,
}

/// HTTP implementation of [`ImageOperations`]. No retries.
#[derive(Debug, Clone)]
pub struct ImageClient {
    http: reqwest::Client,
    base_url: String,
}

impl ImageClient {
    /// Creates a client for the server rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url)
    }

    /// Creates a client reusing an existing `reqwest::Client`.
    pub fn with_http_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    async fn run(
        &self,
        endpoint: Endpoint,
        source: &str,
        prompt: &str,
    ) -> Result<String, ClientError> {
        let body = ImageRequest {
            prompt: Some(prompt.to_string()),
            source_image: (!source.is_empty()).then(|| source.to_string()),
        };

        let response = self
            .http
            .post(format!("{}{}", self.base_url, endpoint.path()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .map(|body| body.error)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| endpoint.failure().to_string());
            tracing::debug!(%status, %message, "image request rejected");
            return Err(ClientError::Request(message));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Response(e.to_string()))?;
        let image_url = submitted
            .image_url
            .filter(|url| !url.is_empty())
            .ok_or(ClientError::MissingImageUrl)?;

        self.fetch_as_data_url(endpoint, &image_url).await
    }

    async fn fetch_as_data_url(
        &self,
        endpoint: Endpoint,
        image_url: &str,
    ) -> Result<String, ClientError> {
        let response = self
            .http
            .get(image_url)
            .send()
            .await
            .map_err(|e| ClientError::Fetch(format!("{}: {e}", endpoint.fetch_failure())))?;

        if !response.status().is_success() {
            return Err(ClientError::Fetch(endpoint.fetch_failure().to_string()));
        }

        let declared_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| v.starts_with("image/"));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Fetch(format!("{}: {e}", endpoint.fetch_failure())))?;

        match declared_type {
            Some(_) if bytes.is_empty() => Err(EncodingError::Empty.into()),
            Some(mime_type) => Ok(encoding::to_data_url(&bytes, &mime_type)),
            None => Ok(encoding::encode_image(&bytes)?),
        }
    }
}

#[async_trait]
impl ImageOperations for ImageClient {
    async fn generate_or_transform(
        &self,
        source: &str,
        prompt: &str,
    ) -> Result<String, ClientError> {
        self.run(Endpoint::Generate, source, prompt).await
    }

    async fn edit_existing(&self, source: &str, prompt: &str) -> Result<String, ClientError> {
        self.run(Endpoint::Edit, source, prompt).await
    }
}
