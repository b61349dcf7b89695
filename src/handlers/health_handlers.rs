//! Welcome & health handlers.
//!
//! - GET /        -> welcome message pointing at the API docs
//! - GET /health  -> liveness ("healthy"), never touches the backend

use crate::models::file::{HealthResponse, MessageResponse};
use axum::Json;

const WELCOME: &str =
    "Welcome to the File Storage Service. Visit /swagger/index.html for API documentation.";

/// `GET /`
#[utoipa::path(
    get,
    path = "/",
    tag = "General",
    responses((status = 200, description = "Welcome message", body = MessageResponse))
)]
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: WELCOME.into(),
    })
}

/// `GET /health`
///
/// Cheap liveness probe; always 200.
#[utoipa::path(
    get,
    path = "/health",
    tag = "General",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
    })
}
