//! Image analysis relay endpoint
//!
//! `POST /api/analyze` takes `{ imageBase64, imageMime }`, forwards the image
//! with the server's API key, and answers with the validated nutrition
//! record. `OPTIONS` answers 200 for cross-origin pre-flight; other methods
//! get 405.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use macrolens_common::api::AnalyzeRequest;
use macrolens_common::inference::EncodedImage;
use macrolens_common::parser::parse_nutrition;
use macrolens_common::NutritionRecord;
use tracing::info;

use crate::error::{RelayError, RelayResult};
use crate::AppState;

/// POST /api/analyze
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> RelayResult<Json<NutritionRecord>> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("Rejected analyze body: {}", e);
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            RelayError::PayloadTooLarge
        } else {
            RelayError::BadRequest("Missing image data".to_string())
        }
    })?;

    let (data, mime) = request
        .fields()
        .ok_or_else(|| RelayError::BadRequest("Missing image data".to_string()))?;

    let credential = state
        .credential
        .as_ref()
        .ok_or_else(|| RelayError::Config("API key not configured on server".to_string()))?;

    let image = EncodedImage::new(data, mime);
    info!(media_type = %image.media_type, payload_len = image.base64.len(), "Relaying image");

    let raw = state.backend.analyze(&image, Some(credential)).await?;
    let record = parse_nutrition(&raw)?;

    info!(food_name = %record.food_name, calories = record.calories, "Analysis relayed");
    Ok(Json(record))
}

/// OPTIONS /api/analyze
///
/// Under [`crate::build_router`] the CORS layer answers OPTIONS first; this
/// keeps the route correct when mounted without it.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Any other method on /api/analyze
pub async fn method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}

/// Build analysis routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route(
        "/api/analyze",
        post(analyze)
            .options(preflight)
            .fallback(method_not_allowed),
    )
}
