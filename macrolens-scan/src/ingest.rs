//! Image intake
//!
//! Reads a food photo from disk, checks that it is an image, and produces the
//! base64 payload sent for inference plus an absolute path used to show the
//! photo again later (history thumbnails).

use base64::Engine;
use macrolens_common::inference::EncodedImage;
use macrolens_common::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A photo accepted for scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedImage {
    /// Payload and media type for the inference request
    pub encoded: EncodedImage,
    /// Absolute path of the original file
    pub display_handle: PathBuf,
}

impl IngestedImage {
    pub fn media_type(&self) -> &str {
        &self.encoded.media_type
    }
}

/// Read and encode a photo
///
/// `declared_mime` overrides detection; otherwise the type is sniffed from
/// the file's magic bytes. Returns `Ok(None)` when the input is not an image
/// (or its type cannot be determined). Read failures are errors.
pub async fn ingest_file(path: &Path, declared_mime: Option<&str>) -> Result<Option<IngestedImage>> {
    if let Some(mime) = declared_mime {
        if !is_image_type(mime) {
            debug!(path = %path.display(), media_type = %mime, "Ignoring non-image input");
            return Ok(None);
        }
    }

    let bytes = tokio::fs::read(path).await?;

    let media_type = match declared_mime {
        Some(mime) => mime.trim().to_ascii_lowercase(),
        None => match sniff_media_type(&bytes) {
            Some(mime) => mime.to_string(),
            None => {
                debug!(path = %path.display(), "Ignoring input of unknown type");
                return Ok(None);
            }
        },
    };

    if !is_image_type(&media_type) {
        debug!(path = %path.display(), media_type = %media_type, "Ignoring non-image input");
        return Ok(None);
    }

    let display_handle = tokio::fs::canonicalize(path).await?;
    let base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);

    info!(
        path = %display_handle.display(),
        media_type = %media_type,
        bytes = bytes.len(),
        "Image accepted"
    );

    Ok(Some(IngestedImage {
        encoded: EncodedImage::new(base64, media_type),
        display_handle,
    }))
}

/// Media type from magic bytes, if recognized
pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

pub fn is_image_type(media_type: &str) -> bool {
    media_type.trim().to_ascii_lowercase().starts_with("image/")
}
