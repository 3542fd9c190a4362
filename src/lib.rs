//! Ghibli Studio - restyle uploaded images through an AI image service.
//!
//! The crate has two halves:
//!
//! - a server ([`adapter`]) exposing `POST /generate-image` and
//!   `POST /edit-image`, relaying each request to an [`upstream::ImageService`];
//! - a client side ([`client`], [`history`], [`controller`]) that calls those
//!   endpoints, turns results back into `data:` URLs and keeps a navigable,
//!   newest-first history for the session.
//!
//! ```no_run
//! use ghibli_studio::{ImageClient, InteractionController};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = InteractionController::new(ImageClient::new("http://localhost:3000"));
//! controller.stage_file("photo.png").await?;
//! let record = controller.generate().await?;
//! println!("{} -> {} bytes", record.prompt(), record.result().len());
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod client;
pub mod config;
pub mod controller;
pub mod encoding;
mod error;
pub mod history;
pub mod prompts;
pub mod upstream;

pub use adapter::{router, AppState, ImageRequest, ImageUrlResponse};
pub use client::{ImageClient, ImageOperations};
pub use config::Config;
pub use controller::{InFlight, InteractionController, SessionState};
pub use error::{
    ApiError, ClientError, ConfigError, ControllerError, EncodingError, ErrorBody, Notification,
    OperationKind, UpstreamError,
};
pub use history::{History, HistoryRecord, Swipe};
pub use upstream::{ImageService, OpenAiImageService, OpenAiImageServiceBuilder};
