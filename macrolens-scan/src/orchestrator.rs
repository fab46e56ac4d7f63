//! Scan pipeline state machine
//!
//! One [`ScanSession`] drives a photo through inference, parsing, and history:
//!
//! ```text
//! Idle → ImageReady → Analyzing → Succeeded → Idle
//!                              ↘ Failed → ImageReady (acknowledge, or retry)
//! ```
//!
//! Only one inference call is in flight per session. While `Analyzing`, new
//! images and further analyze requests are ignored. Every network or parse
//! failure is converted to a [`ScanError`] here; nothing escapes to the caller
//! except the refusals raised before a request is sent.

use macrolens_common::inference::{EncodedImage, InferenceBackend, InferenceError};
use macrolens_common::parser::{parse_nutrition, ParseError};
use macrolens_common::{Credential, HistoryEntry, HistoryStore, NutritionRecord};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ingest::IngestedImage;

pub const MSG_INVALID_KEY: &str = "Invalid API key. Double-check it in the settings.";
pub const MSG_UNREADABLE: &str = "Couldn't read the food. Try a clearer, well-lit photo.";
pub const MSG_NO_IMAGE: &str = "Select a food photo first.";
pub const MSG_NO_CREDENTIAL: &str = "Add your API key first.";

/// Scan failure taxonomy
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScanError {
    #[error("No image selected")]
    NoImage,

    #[error("No usable API key")]
    NoCredential,

    #[error("API key rejected: {0}")]
    AuthError(String),

    #[error("Inference service error: {0}")]
    UpstreamError(String),

    #[error("Model answer is not a nutrition record: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    TransportError(String),
}

impl ScanError {
    /// Message shown to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            ScanError::NoImage => MSG_NO_IMAGE,
            ScanError::NoCredential => MSG_NO_CREDENTIAL,
            ScanError::AuthError(_) => MSG_INVALID_KEY,
            ScanError::UpstreamError(_)
            | ScanError::MalformedResponse(_)
            | ScanError::TransportError(_) => MSG_UNREADABLE,
        }
    }
}

impl From<InferenceError> for ScanError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::MissingCredential => ScanError::NoCredential,
            InferenceError::Transport(msg) => ScanError::TransportError(msg),
            InferenceError::Auth(msg) => ScanError::AuthError(msg),
            InferenceError::Upstream(msg) => ScanError::UpstreamError(msg),
            InferenceError::Malformed(msg) => ScanError::MalformedResponse(msg),
        }
    }
}

impl From<ParseError> for ScanError {
    fn from(err: ParseError) -> Self {
        ScanError::MalformedResponse(err.to_string())
    }
}

/// Where a scan attempt stands
///
/// Every state after `Idle` keeps the accepted image so a failed scan can be
/// retried without re-reading the file.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    ImageReady {
        image: IngestedImage,
    },
    Analyzing {
        image: IngestedImage,
    },
    Succeeded {
        image: IngestedImage,
        record: NutritionRecord,
    },
    Failed {
        image: IngestedImage,
        error: ScanError,
    },
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::ImageReady { .. } => "image_ready",
            ScanState::Analyzing { .. } => "analyzing",
            ScanState::Succeeded { .. } => "succeeded",
            ScanState::Failed { .. } => "failed",
        }
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, ScanState::Analyzing { .. })
    }

    pub fn image(&self) -> Option<&IngestedImage> {
        match self {
            ScanState::Idle => None,
            ScanState::ImageReady { image }
            | ScanState::Analyzing { image }
            | ScanState::Succeeded { image, .. }
            | ScanState::Failed { image, .. } => Some(image),
        }
    }

    pub fn record(&self) -> Option<&NutritionRecord> {
        match self {
            ScanState::Succeeded { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ScanError> {
        match self {
            ScanState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result of asking to start an analysis
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// State moved to `Analyzing`; send this image
    Started(EncodedImage),
    /// A call is already in flight; nothing to send
    AlreadyRunning,
}

/// Session state for one scanner: current scan, credential, history
pub struct ScanSession {
    state: ScanState,
    credential: Option<Credential>,
    history: HistoryStore,
    backend: Arc<dyn InferenceBackend>,
}

impl ScanSession {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        credential: Option<Credential>,
        history: HistoryStore,
    ) -> Self {
        Self {
            state: ScanState::Idle,
            credential,
            history,
            backend,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Take a new photo, discarding any previous result or error
    ///
    /// Returns `false` (and changes nothing) while an analysis is running.
    pub fn accept_image(&mut self, image: IngestedImage) -> bool {
        if self.state.is_analyzing() {
            debug!("Analysis in progress, ignoring new image");
            return false;
        }

        debug!(from = self.state.name(), media_type = %image.media_type(), "Image ready");
        self.state = ScanState::ImageReady { image };
        true
    }

    /// Move to `Analyzing` if the preconditions hold
    ///
    /// Refusals leave the state untouched and send nothing.
    pub fn begin_analysis(&mut self) -> Result<Dispatch, ScanError> {
        if self.state.is_analyzing() {
            debug!("Analysis already in progress");
            return Ok(Dispatch::AlreadyRunning);
        }

        let encoded = match self.state.image() {
            Some(image) if !image.encoded.is_empty() => image.encoded.clone(),
            _ => return Err(ScanError::NoImage),
        };

        if self.backend.requires_credential() {
            match &self.credential {
                Some(key) if key.looks_well_formed() => {}
                Some(_) => {
                    warn!("Stored API key does not look like an Anthropic key");
                    return Err(ScanError::NoCredential);
                }
                None => return Err(ScanError::NoCredential),
            }
        }

        self.state = match std::mem::take(&mut self.state) {
            ScanState::ImageReady { image }
            | ScanState::Succeeded { image, .. }
            | ScanState::Failed { image, .. } => ScanState::Analyzing { image },
            other => other,
        };

        info!(media_type = %encoded.media_type, payload_len = encoded.base64.len(), "Analyzing image");
        Ok(Dispatch::Started(encoded))
    }

    /// Apply the outcome of the in-flight call
    ///
    /// A valid record is appended to history and the state becomes
    /// `Succeeded`; anything else becomes `Failed` with the image retained.
    pub async fn complete_analysis(&mut self, outcome: Result<String, InferenceError>) {
        let image = match std::mem::take(&mut self.state) {
            ScanState::Analyzing { image } => image,
            other => {
                warn!(state = other.name(), "No analysis in flight, discarding outcome");
                self.state = other;
                return;
            }
        };

        let result = outcome
            .map_err(ScanError::from)
            .and_then(|raw| parse_nutrition(&raw).map_err(ScanError::from));

        match result {
            Ok(record) => {
                info!(
                    food_name = %record.food_name,
                    calories = record.calories,
                    confidence = %record.confidence,
                    "Scan succeeded"
                );
                let thumbnail = image.display_handle.to_string_lossy().into_owned();
                self.history
                    .append(HistoryEntry::new(record.clone(), Some(thumbnail)))
                    .await;
                self.state = ScanState::Succeeded { image, record };
            }
            Err(error) => {
                warn!("Scan failed: {}", error);
                self.state = ScanState::Failed { image, error };
            }
        }
    }

    /// Run one analysis to completion
    ///
    /// A no-op while another analysis is in flight. Returns `Err` only for
    /// refusals (`NoImage`, `NoCredential`); inference outcomes land in
    /// [`ScanSession::state`].
    pub async fn analyze(&mut self) -> Result<(), ScanError> {
        let image = match self.begin_analysis()? {
            Dispatch::Started(image) => image,
            Dispatch::AlreadyRunning => return Ok(()),
        };

        let backend = Arc::clone(&self.backend);
        let outcome = backend.analyze(&image, self.credential.as_ref()).await;
        self.complete_analysis(outcome).await;
        Ok(())
    }

    /// Dismiss the current outcome
    ///
    /// `Failed` returns to `ImageReady` with the same image; `Succeeded`
    /// returns to `Idle`.
    pub fn acknowledge(&mut self) {
        self.state = match std::mem::take(&mut self.state) {
            ScanState::Failed { image, .. } => ScanState::ImageReady { image },
            ScanState::Succeeded { .. } => ScanState::Idle,
            other => other,
        };
    }

    /// Drop the current image; ignored while analyzing
    pub fn reset(&mut self) {
        if self.state.is_analyzing() {
            debug!("Analysis in progress, ignoring reset");
            return;
        }
        self.state = ScanState::Idle;
    }
}
