//! Error types for the studio server and its client.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON body returned by the server for every non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// User-facing error message.
    pub error: String,
}

/// Failures converting between raw bytes and `data:` URLs.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The payload after the `data:` prefix is not valid base64.
    #[error("failed to decode base64 image data: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The MIME type could not be derived from the content or file name.
    #[error("unrecognized image data")]
    UnknownFormat,

    /// There were no bytes to encode.
    #[error("image data is empty")]
    Empty,

    /// Reading a picked file failed.
    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the upstream image service.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Credential missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Upstream returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit or quota exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Upstream answered successfully but without a usable image URL.
    #[error("upstream response contained no image URL")]
    MissingImageUrl,

    /// Request could not be assembled.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Errors produced at the HTTP boundary, rendered as `{ "error": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Client-caused problem, answered with 400.
    #[error("{0}")]
    Validation(String),

    /// Upstream call failed, answered with 500 and a generic message.
    /// The cause is logged and never sent to the client.
    #[error("{message}: {source}")]
    Upstream {
        message: &'static str,
        #[source]
        source: UpstreamError,
    },
}

impl ApiError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn upstream(message: &'static str, source: UpstreamError) -> Self {
        Self::Upstream { message, source }
    }

    /// HTTP status this error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            Self::Validation(message) => {
                tracing::warn!(%message, "rejected request");
                message
            }
            Self::Upstream { message, source } => {
                tracing::error!(error = %source, "{message}");
                message.to_string()
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Errors surfaced by the remote image operation client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("{0}")]
    Request(String),

    /// The success response could not be read.
    #[error("invalid response from API: {0}")]
    Response(String),

    /// The success response carried no `imageUrl`.
    #[error("No image URL returned from API")]
    MissingImageUrl,

    /// Downloading the generated image failed.
    #[error("{0}")]
    Fetch(String),

    /// The downloaded bytes could not be turned into a `data:` URL.
    #[error("Failed to convert image to base64: {0}")]
    Conversion(#[from] EncodingError),

    /// The request never reached the server.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The operation did not finish in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Which remote operation a controller call dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Text-to-image or variation.
    Generate,
    /// Whole-image edit of the current result.
    Edit,
}

/// Reasons a controller action was rejected or failed.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Another generate or edit is still running.
    #[error("an image operation is already in progress")]
    Busy,

    /// Neither a prompt nor a staged image is present.
    #[error("a prompt or an image is required")]
    MissingInput,

    /// The prompt is blank.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// There is no generated image to edit.
    #[error("no generated image to edit")]
    NoCurrentImage,

    /// The remote call failed.
    #[error("{operation:?} failed: {source}")]
    Failed {
        operation: OperationKind,
        #[source]
        source: ClientError,
    },
}

/// A short user-facing notice, rendered by the UI as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Headline.
    pub title: String,
    /// One-line explanation.
    pub description: String,
}

impl ControllerError {
    /// Converts the error into the notice shown to the user.
    ///
    /// Returns `None` for [`ControllerError::Busy`], which the UI expresses
    /// by disabling its buttons instead.
    pub fn notification(&self) -> Option<Notification> {
        let (title, description) = match self {
            Self::Busy => return None,
            Self::MissingInput => (
                "Nothing to transform",
                "Please upload an image or enter a prompt first".to_string(),
            ),
            Self::EmptyPrompt => (
                "Empty prompt",
                "Please enter a prompt for the transformation".to_string(),
            ),
            Self::NoCurrentImage => (
                "No image to edit",
                "Generate an image before editing it".to_string(),
            ),
            Self::Failed {
                operation: OperationKind::Generate,
                source,
            } => ("Generation failed", source.to_string()),
            Self::Failed {
                operation: OperationKind::Edit,
                source,
            } => ("Edit failed", source.to_string()),
        };
        Some(Notification {
            title: title.to_string(),
            description,
        })
    }
}

/// Configuration errors detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `OPENAI_API_KEY` is unset or blank.
    #[error("OPENAI_API_KEY must be set")]
    MissingApiKey,

    /// `BIND_ADDR` is not a socket address.
    #[error("invalid BIND_ADDR {value:?}: {reason}")]
    InvalidBindAddr { value: String, reason: String },

    /// `UPSTREAM_TIMEOUT_SECS` is not a positive integer.
    #[error("invalid UPSTREAM_TIMEOUT_SECS {0:?}")]
    InvalidTimeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status() {
        assert_eq!(
            ApiError::validation("Prompt is required").status(),
            StatusCode::BAD_REQUEST
        );
        let upstream = ApiError::upstream(
            "Failed to generate image",
            UpstreamError::Auth("bad key".into()),
        );
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_upstream_error_display() {
        let err = UpstreamError::Api {
            status: 400,
            message: "Invalid size".into(),
        };
        assert_eq!(err.to_string(), "API error: 400 - Invalid size");
    }

    #[test]
    fn test_missing_image_url_message() {
        assert_eq!(
            ClientError::MissingImageUrl.to_string(),
            "No image URL returned from API"
        );
    }

    #[test]
    fn test_busy_has_no_notification() {
        assert!(ControllerError::Busy.notification().is_none());
    }

    #[test]
    fn test_failed_notification_carries_cause() {
        let err = ControllerError::Failed {
            operation: OperationKind::Edit,
            source: ClientError::Request("Failed to edit image".into()),
        };
        let notice = err.notification().unwrap();
        assert_eq!(notice.title, "Edit failed");
        assert_eq!(notice.description, "Failed to edit image");
    }
}
