//! HTTP boundary relaying generate and edit requests to the upstream service.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::error::ApiError;
use crate::upstream::ImageService;

/// Upper bound on the generated edit mask, in bytes.
pub const MAX_MASK_BYTES: usize = 1024 * 1024;
/// Largest accepted request body; base64 photos are large.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

const GENERATE_FAILED: &str = "Failed to generate image";
const EDIT_FAILED: &str = "Failed to edit image";

/// Shared server state.
pub struct AppState {
    service: Box<dyn ImageService>,
}

impl AppState {
    pub fn new(service: impl ImageService + 'static) -> Self {
        Self {
            service: Box::new(service),
        }
    }
}

/// Body accepted by both endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
}

/// Successful response of both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUrlResponse {
    pub image_url: String,
}

/// How a `/generate-image` request is served, decided once from its body.
#[derive(Debug, PartialEq, Eq)]
pub enum Generation {
    /// No source image: draw from the prompt alone.
    TextToImage { prompt: String },
    /// A source image was supplied: ask for a variation of it.
    ImageVariation { image: Vec<u8> },
}

impl Generation {
    fn kind(&self) -> &'static str {
        match self {
            Self::TextToImage { .. } => "text-to-image",
            Self::ImageVariation { .. } => "variation",
        }
    }
}

/// A validated `/edit-image` request.
#[derive(Debug, PartialEq, Eq)]
pub struct EditJob {
    pub prompt: String,
    pub image: Vec<u8>,
    pub mask: Vec<u8>,
}

impl ImageRequest {
    /// Resolves a generate request into text-to-image or variation.
    pub fn into_generation(self) -> Result<Generation, ApiError> {
        let prompt =
            present(self.prompt).ok_or_else(|| ApiError::validation("Prompt is required"))?;

        match present(self.source_image) {
            None => Ok(Generation::TextToImage { prompt }),
            Some(source) => Ok(Generation::ImageVariation {
                image: decode_source(&source)?,
            }),
        }
    }

    /// Validates an edit request and prepares its whole-image mask.
    pub fn into_edit(self) -> Result<EditJob, ApiError> {
        let (Some(prompt), Some(source)) = (present(self.prompt), present(self.source_image))
        else {
            return Err(ApiError::validation(
                "Both prompt and source image are required",
            ));
        };

        let image = decode_source(&source)?;
        let mask = full_coverage_mask(image.len());
        Ok(EditJob {
            prompt,
            image,
            mask,
        })
    }
}

/// Builds a uniformly white mask so the edit may touch every pixel.
///
/// The mask follows the source byte length, capped at [`MAX_MASK_BYTES`].
pub fn full_coverage_mask(source_len: usize) -> Vec<u8> {
    vec![0xFF; source_len.min(MAX_MASK_BYTES)]
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn decode_source(source: &str) -> Result<Vec<u8>, ApiError> {
    encoding::decode_data_url(source).map_err(|e| {
        tracing::debug!(error = %e, "undecodable source image");
        ApiError::validation("Source image is not valid base64 image data")
    })
}

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate-image", post(generate_image))
        .route("/edit-image", post(edit_image))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn generate_image(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<ImageUrlResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let generation = request.into_generation()?;
    let kind = generation.kind();

    let result = match generation {
        Generation::TextToImage { prompt } => state.service.generate_from_text(&prompt).await,
        Generation::ImageVariation { image } => state.service.create_variation(image).await,
    };
    let image_url = result.map_err(|e| ApiError::upstream(GENERATE_FAILED, e))?;

    tracing::info!(kind, "image generated");
    Ok(Json(ImageUrlResponse { image_url }))
}

async fn edit_image(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<ImageUrlResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let job = request.into_edit()?;
    let mask_bytes = job.mask.len();

    let image_url = state
        .service
        .edit_with_mask(job.image, job.mask, &job.prompt)
        .await
        .map_err(|e| ApiError::upstream(EDIT_FAILED, e))?;

    tracing::info!(mask_bytes, "image edited");
    Ok(Json(ImageUrlResponse { image_url }))
}
