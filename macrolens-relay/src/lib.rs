//! macrolens-relay library
//!
//! HTTP relay that forwards food images to the inference endpoint using a
//! server-held API key, so the key never reaches the client.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use macrolens_common::inference::InferenceBackend;
use macrolens_common::Credential;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

pub use crate::error::{RelayError, RelayResult};

/// Largest accepted request body (base64 inflates images by a third)
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Upstream inference client
    pub backend: Arc<dyn InferenceBackend>,
    /// Server-held API key; requests fail with 500 while absent
    pub credential: Option<Credential>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(backend: Arc<dyn InferenceBackend>, credential: Option<Credential>) -> Self {
        Self {
            backend,
            credential,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(api::analyze_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
