//! Anthropic Messages API client
//!
//! Sends one user message with an image part followed by the fixed
//! nutrition instruction, and concatenates the text parts of the answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EncodedImage, InferenceBackend, InferenceError, NUTRITION_PROMPT};
use crate::config::{TomlConfig, DEFAULT_API_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::credential::Credential;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const USER_AGENT: &str = concat!("MacroLens/", env!("CARGO_PKG_VERSION"));

/// Error `type` values that mean the API key was rejected
const AUTH_ERROR_TYPES: [&str; 2] = ["authentication_error", "permission_error"];

/// Direct client for the Messages endpoint
#[derive(Clone)]
pub struct AnthropicClient {
    http_client: reqwest::Client,
    api_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    /// Client configured from the TOML settings
    pub fn from_config(config: &TomlConfig) -> Result<Self, InferenceError> {
        Ok(Self::new(config.api_url.clone(), config.request_timeout())?
            .with_model(config.model.clone())
            .with_max_tokens(config.max_tokens))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request body for one image
    pub fn build_request(&self, image: &EncodedImage) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource {
                            source_type: "base64".to_string(),
                            media_type: image.media_type.clone(),
                            data: image.base64.clone(),
                        },
                    },
                    ContentBlock::Text {
                        text: NUTRITION_PROMPT.to_string(),
                    },
                ],
            }],
        }
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[async_trait]
impl InferenceBackend for AnthropicClient {
    fn requires_credential(&self) -> bool {
        true
    }

    async fn analyze(
        &self,
        image: &EncodedImage,
        credential: Option<&Credential>,
    ) -> Result<String, InferenceError> {
        let credential = credential.ok_or(InferenceError::MissingCredential)?;
        let body = self.build_request(image);

        tracing::debug!(
            model = %self.model,
            media_type = %image.media_type,
            payload_len = image.base64.len(),
            "Sending image to inference endpoint"
        );

        let response = self
            .http_client
            .post(&self.api_url)
            .header("x-api-key", credential.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        interpret_response(status, &text)
    }
}

/// Turn an HTTP status and body into the model's text or a classified error
pub fn interpret_response(status: u16, body: &str) -> Result<String, InferenceError> {
    let parsed = serde_json::from_str::<MessagesResponse>(body);

    if let Ok(MessagesResponse {
        error: Some(error), ..
    }) = &parsed
    {
        return Err(classify_upstream_error(
            status,
            error.error_type.as_deref(),
            error.message.as_deref().unwrap_or("unknown error"),
        ));
    }

    if !(200..300).contains(&status) {
        return Err(classify_upstream_error(status, None, body.trim()));
    }

    let response = parsed.map_err(|e| {
        InferenceError::Upstream(format!("unreadable response body: {}", e))
    })?;

    let content = response
        .content
        .ok_or_else(|| InferenceError::Upstream("response contained no content".to_string()))?;

    let text: String = content
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    tracing::info!(status, answer_len = text.len(), "Inference call completed");
    Ok(text)
}

/// Classify an upstream failure by HTTP status and error type
///
/// Authentication failures are recognised structurally, never by message text.
pub fn classify_upstream_error(
    status: u16,
    error_type: Option<&str>,
    message: &str,
) -> InferenceError {
    let auth_type = error_type.is_some_and(|t| AUTH_ERROR_TYPES.contains(&t));
    if auth_type || status == 401 || status == 403 {
        tracing::warn!(status, "Inference endpoint rejected the API key");
        return InferenceError::Auth(message.to_string());
    }

    tracing::warn!(status, error_type = ?error_type, "Inference endpoint reported an error: {}", message);
    InferenceError::Upstream(message.to_string())
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Option<Vec<ContentPart>>,
    #[serde(default)]
    error: Option<ApiErrorObject>,
}

/// Only text parts carry answer text; other part types contribute nothing
#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorObject {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AnthropicClient::new(DEFAULT_API_URL, Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_request_shape() {
        let client = AnthropicClient::default().with_model("test-model").with_max_tokens(256);
        let request = client.build_request(&EncodedImage::new("aGVsbG8=", "image/jpeg"));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "test-model");
        assert_eq!(value["max_tokens"], 256);
        assert_eq!(value["messages"][0]["role"], "user");

        let content = &value["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "image/jpeg");
        assert_eq!(content[0]["source"]["data"], "aGVsbG8=");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(content[1]["text"], NUTRITION_PROMPT);
    }

    #[tokio::test]
    async fn test_missing_credential_refused_before_sending() {
        // Unroutable URL: reaching the network would yield Transport, not MissingCredential
        let client = AnthropicClient::new("http://127.0.0.1:9/v1/messages", Duration::from_secs(1))
            .unwrap();
        let result = client
            .analyze(&EncodedImage::new("aGVsbG8=", "image/png"), None)
            .await;
        assert_eq!(result, Err(InferenceError::MissingCredential));
    }

    #[test]
    fn test_text_parts_concatenated() {
        let body = r#"{"content":[{"type":"text","text":"{\"a\":"},{"type":"text","text":"1}"}]}"#;
        assert_eq!(interpret_response(200, body).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_non_text_parts_skipped() {
        let body = r#"{"content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"ok"}]}"#;
        assert_eq!(interpret_response(200, body).unwrap(), "ok");
    }

    #[test]
    fn test_authentication_error_classified() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(
            interpret_response(401, body),
            Err(InferenceError::Auth("invalid x-api-key".to_string()))
        );
    }

    #[test]
    fn test_other_error_is_upstream_even_if_message_says_invalid() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"invalid image data"}}"#;
        assert_eq!(
            interpret_response(400, body),
            Err(InferenceError::Upstream("invalid image data".to_string()))
        );
    }

    #[test]
    fn test_error_object_with_success_status() {
        let body = r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(
            interpret_response(200, body),
            Err(InferenceError::Upstream("Overloaded".to_string()))
        );
    }

    #[test]
    fn test_non_json_error_status() {
        assert_eq!(
            interpret_response(403, "Forbidden"),
            Err(InferenceError::Auth("Forbidden".to_string()))
        );
        assert_eq!(
            interpret_response(502, "Bad Gateway"),
            Err(InferenceError::Upstream("Bad Gateway".to_string()))
        );
    }

    #[test]
    fn test_missing_content() {
        assert!(matches!(
            interpret_response(200, "{}"),
            Err(InferenceError::Upstream(_))
        ));
    }
}
