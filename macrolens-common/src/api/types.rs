//! Relay request/response bodies

use serde::{Deserialize, Serialize};

/// `POST /api/analyze` request body
///
/// Both fields are optional at the type level so the relay can answer a
/// missing field with its own 400 message instead of a decoder rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_mime: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(image_base64: impl Into<String>, image_mime: impl Into<String>) -> Self {
        Self {
            image_base64: Some(image_base64.into()),
            image_mime: Some(image_mime.into()),
        }
    }

    /// Both fields, if present and non-empty
    pub fn fields(&self) -> Option<(&str, &str)> {
        let data = self.image_base64.as_deref().filter(|s| !s.is_empty())?;
        let mime = self.image_mime.as_deref().filter(|s| !s.is_empty())?;
        Some((data, mime))
    }
}

/// Failure category reported by the relay alongside its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request body missing fields or unreadable
    BadRequest,
    /// Request body over the relay's size limit
    PayloadTooLarge,
    /// Relay has no API key configured
    Config,
    /// Upstream rejected the relay's API key
    Auth,
    /// Upstream reported any other failure
    Upstream,
    /// Model output was not a valid nutrition record
    Malformed,
    /// Relay could not reach upstream
    Transport,
    /// Method other than POST/OPTIONS
    MethodNotAllowed,
}

/// Error body returned with any non-2xx relay status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayErrorBody {
    pub error: String,
    /// Absent in responses from relays that predate structured kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}
