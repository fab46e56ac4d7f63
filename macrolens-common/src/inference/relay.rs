//! Relay client
//!
//! Posts the image to a MacroLens relay, which injects its own API key and
//! answers with the nutrition record JSON, or `{error, kind}` on failure.

use async_trait::async_trait;
use std::time::Duration;

use super::{EncodedImage, InferenceBackend, InferenceError};
use crate::api::{AnalyzeRequest, ErrorKind, RelayErrorBody};
use crate::config::TomlConfig;
use crate::credential::Credential;

const USER_AGENT: &str = concat!("MacroLens/", env!("CARGO_PKG_VERSION"));

/// Client for `POST /api/analyze` on a relay
#[derive(Clone)]
pub struct RelayClient {
    http_client: reqwest::Client,
    relay_url: String,
}

impl RelayClient {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            relay_url: relay_url.into(),
        })
    }

    pub fn from_config(config: &TomlConfig) -> Result<Self, InferenceError> {
        Self::new(config.relay_url.clone(), config.request_timeout())
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }
}

#[async_trait]
impl InferenceBackend for RelayClient {
    fn requires_credential(&self) -> bool {
        false
    }

    async fn analyze(
        &self,
        image: &EncodedImage,
        _credential: Option<&Credential>,
    ) -> Result<String, InferenceError> {
        let body = AnalyzeRequest::new(image.base64.clone(), image.media_type.clone());

        tracing::debug!(
            relay = %self.relay_url,
            media_type = %image.media_type,
            payload_len = image.base64.len(),
            "Sending image to relay"
        );

        let response = self
            .http_client
            .post(&self.relay_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        interpret_relay_response(status, text)
    }
}

/// Map a relay response onto the model's text or a classified error
///
/// On success the body is already the record JSON and is passed through for
/// the caller's parser to validate.
pub fn interpret_relay_response(status: u16, body: String) -> Result<String, InferenceError> {
    if (200..300).contains(&status) {
        return Ok(body);
    }

    let Ok(error) = serde_json::from_str::<RelayErrorBody>(&body) else {
        tracing::warn!(status, "Relay returned an unreadable error body");
        return Err(InferenceError::Upstream(format!("relay returned HTTP {}", status)));
    };

    tracing::warn!(status, kind = ?error.kind, "Relay reported an error: {}", error.error);

    Err(match error.kind {
        Some(ErrorKind::Auth) => InferenceError::Auth(error.error),
        Some(ErrorKind::Malformed) => InferenceError::Malformed(error.error),
        _ => InferenceError::Upstream(error.error),
    })
}
