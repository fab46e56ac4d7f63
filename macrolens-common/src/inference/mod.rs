//! Inference clients
//!
//! Two interchangeable backends produce the model's raw text answer for an
//! encoded image:
//! - [`AnthropicClient`] calls the Messages endpoint directly with an API key
//! - [`RelayClient`] posts the image to a relay that holds the key
//!
//! Neither retries; a failed call is reported once and left to the user.

pub mod anthropic;
pub mod relay;

pub use anthropic::AnthropicClient;
pub use relay::RelayClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::credential::Credential;

/// Fixed instruction sent with every image
pub const NUTRITION_PROMPT: &str = r#"Analyze this food image and estimate its macronutrients.
Respond ONLY with a valid JSON object, no markdown, no extra text:
{
  "foodName": "descriptive name of the food(s)",
  "servingSize": "estimated portion (e.g. 1 bowl ~350g)",
  "calories": <number>,
  "protein": <number in grams>,
  "carbs": <number in grams>,
  "fat": <number in grams>,
  "fiber": <number in grams>,
  "sugar": <number in grams>,
  "confidence": "low|medium|high",
  "notes": "one helpful sentence about the estimate accuracy or key ingredients"
}"#;

/// Base64 image payload with its media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub base64: String,
    pub media_type: String,
}

impl EncodedImage {
    pub fn new(base64: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            media_type: media_type.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.base64.is_empty()
    }
}

/// Inference failure categories
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    /// Direct call attempted without an API key; nothing was sent
    #[error("No API key configured")]
    MissingCredential,

    /// The request could not complete (connect, timeout, unreadable body)
    #[error("Network error: {0}")]
    Transport(String),

    /// Upstream rejected the API key
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Upstream reported any other failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Relay reported that the model's answer was not a nutrition record
    #[error("Malformed model output: {0}")]
    Malformed(String),
}

/// Source of raw model answers
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Whether [`InferenceBackend::analyze`] needs a caller-supplied credential
    fn requires_credential(&self) -> bool;

    /// Submit one image; returns the model's raw text answer
    async fn analyze(
        &self,
        image: &EncodedImage,
        credential: Option<&Credential>,
    ) -> Result<String, InferenceError>;
}
