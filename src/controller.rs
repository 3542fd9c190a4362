//! Session state and the actions a user can take on it.
//!
//! At most one generate or edit runs per session. The busy flag is raised
//! before the remote call and lowered by a drop guard, so it is cleared on
//! success, failure, timeout, and when the caller drops the future.

use std::future::Future;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::client::ImageOperations;
use crate::encoding;
use crate::error::{ClientError, ControllerError, EncodingError, OperationKind};
use crate::history::{History, HistoryRecord, Swipe};
use crate::prompts::{self, DEFAULT_PROMPT};

/// Which remote operation, if any, is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InFlight {
    #[default]
    Idle,
    Generating,
    Editing,
}

/// Everything a session knows; lost when the session ends.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Staged upload as a `data:` URL.
    pub source_image: Option<String>,
    pub prompt: String,
    pub history: History,
    pub in_flight: InFlight,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            source_image: None,
            prompt: DEFAULT_PROMPT.to_string(),
            history: History::new(),
            in_flight: InFlight::Idle,
        }
    }
}

/// Drives generate, edit and navigation against one session.
pub struct InteractionController<C> {
    client: C,
    session: Mutex<SessionState>,
    timeout: Option<Duration>,
}

fn lock(session: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

struct BusyGuard<'a> {
    session: &'a Mutex<SessionState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock(self.session).in_flight = InFlight::Idle;
    }
}

impl<C: ImageOperations> InteractionController<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            session: Mutex::new(SessionState::default()),
            timeout: None,
        }
    }

    /// Bounds every remote operation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads the session.
    pub fn view<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&lock(&self.session))
    }

    pub fn in_flight(&self) -> InFlight {
        lock(&self.session).in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight() != InFlight::Idle
    }

    /// The record shown in the main preview.
    pub fn current(&self) -> Option<HistoryRecord> {
        lock(&self.session).history.current().cloned()
    }

    /// Stages an already encoded image.
    pub fn stage_image(&self, data_url: impl Into<String>) {
        lock(&self.session).source_image = Some(data_url.into());
    }

    /// Encodes a picked file and stages it.
    pub async fn stage_file(&self, path: impl AsRef<Path>) -> Result<(), EncodingError> {
        let data_url = encoding::encode_file(path).await?;
        self.stage_image(data_url);
        Ok(())
    }

    pub fn clear_staged_image(&self) {
        lock(&self.session).source_image = None;
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        lock(&self.session).prompt = prompt.into();
    }

    /// Appends a suggested tag to the prompt.
    pub fn append_tag(&self, tag: &str) {
        let mut session = lock(&self.session);
        session.prompt = prompts::append_tag(&session.prompt, tag);
    }

    /// Generates from the staged image (if any) and the prompt.
    pub async fn generate(&self) -> Result<HistoryRecord, ControllerError> {
        let (source, prompt) = {
            let mut session = lock(&self.session);
            if session.in_flight != InFlight::Idle {
                return Err(ControllerError::Busy);
            }
            let source = session.source_image.clone().unwrap_or_default();
            if source.is_empty() && session.prompt.trim().is_empty() {
                return Err(ControllerError::MissingInput);
            }
            session.in_flight = InFlight::Generating;
            (source, session.prompt.clone())
        };
        let _busy = BusyGuard {
            session: &self.session,
        };

        let outcome = self
            .bounded(self.client.generate_or_transform(&source, &prompt))
            .await;
        self.finish(OperationKind::Generate, source, prompt, outcome)
    }

    /// Edits the image currently shown, using the prompt.
    pub async fn edit(&self) -> Result<HistoryRecord, ControllerError> {
        let (source, prompt) = {
            let mut session = lock(&self.session);
            if session.in_flight != InFlight::Idle {
                return Err(ControllerError::Busy);
            }
            let source = session
                .history
                .current()
                .map(|record| record.result().to_string())
                .ok_or(ControllerError::NoCurrentImage)?;
            if session.prompt.trim().is_empty() {
                return Err(ControllerError::EmptyPrompt);
            }
            session.in_flight = InFlight::Editing;
            (source, session.prompt.clone())
        };
        let _busy = BusyGuard {
            session: &self.session,
        };

        let outcome = self.bounded(self.client.edit_existing(&source, &prompt)).await;
        self.finish(OperationKind::Edit, source, prompt, outcome)
    }

    async fn bounded<F>(&self, operation: F) -> Result<String, ClientError>
    where
        F: Future<Output = Result<String, ClientError>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, operation)
                .await
                .map_err(|_| ClientError::Timeout(limit))?,
            None => operation.await,
        }
    }

    fn finish(
        &self,
        operation: OperationKind,
        source: String,
        prompt: String,
        outcome: Result<String, ClientError>,
    ) -> Result<HistoryRecord, ControllerError> {
        match outcome {
            Ok(result) => {
                let record = lock(&self.session)
                    .history
                    .record_result(source, result, prompt)
                    .clone();
                tracing::info!(id = %record.id(), ?operation, "history updated");
                Ok(record)
            }
            Err(source) => {
                tracing::warn!(error = %source, ?operation, "image operation failed");
                Err(ControllerError::Failed { operation, source })
            }
        }
    }

    pub fn step_backward(&self) {
        lock(&self.session).history.step_backward();
    }

    pub fn step_forward(&self) {
        lock(&self.session).history.step_forward();
    }

    pub fn jump_to(&self, index: usize) -> bool {
        lock(&self.session).history.jump_to(index)
    }

    /// Navigates on a horizontal touch gesture. Returns whether it counted
    /// as a swipe.
    pub fn swipe(&self, start_x: f32, end_x: f32) -> bool {
        match Swipe::from_gesture(start_x, end_x) {
            Some(swipe) => {
                lock(&self.session).history.swipe(swipe);
                true
            }
            None => false,
        }
    }

    /// Restages a record's source image and prompt for another run.
    pub fn load_history_item(&self, index: usize) -> bool {
        let mut session = lock(&self.session);
        let Some(record) = session.history.get(index) else {
            return false;
        };
        let source = (!record.source().is_empty()).then(|| record.source().to_string());
        let prompt = record.prompt().to_string();
        session.source_image = source;
        session.prompt = prompt;
        true
    }
}
