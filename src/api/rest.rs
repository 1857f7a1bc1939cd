//! Axum REST API handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::engine::EmotionDetector;
use crate::service::{EmotionResponse, EmotionService};

use super::dto::*;
use super::error::ApiResult;

/// Application state shared across handlers
pub struct AppState<D: EmotionDetector> {
    pub service: Arc<EmotionService<D>>,
    pub start_time: Instant,
}

/// Create the REST API router
pub fn create_rest_router<D: EmotionDetector + 'static>(
    state: Arc<AppState<D>>,
    max_body_bytes: usize,
) -> Router {
    Router::new()
        .route("/predict", post(predict_handler::<D>))
        .route("/health", get(health_handler::<D>))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin, method and header, with credentials.
///
/// Wildcards cannot be combined with credentials, so the request's own
/// values are echoed back instead.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Predict emotions for the faces in a base64 image
async fn predict_handler<D: EmotionDetector + 'static>(
    State(state): State<Arc<AppState<D>>>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> ApiResult<Json<EmotionResponse>> {
    let Json(request) = payload.inspect_err(|e| warn!("Rejected predict request: {}", e.body_text()))?;

    let response = state.service.predict(request.image).await?;
    Ok(Json(response))
}

/// Health check
async fn health_handler<D: EmotionDetector + 'static>(
    State(state): State<Arc<AppState<D>>>,
) -> Json<HealthResponse> {
    let health = state.service.health();

    Json(HealthResponse {
        healthy: health.healthy,
        version: health.version,
        models_loaded: health.models_loaded,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
