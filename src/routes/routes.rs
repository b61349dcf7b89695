//! Defines routes for the file storage API.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET    /`        — welcome message
//!   - `GET    /health`  — liveness probe
//!   - `GET    /swagger/` — interactive API docs (`/api-docs/openapi.json`)
//!
//! - **File endpoints**
//!   - `GET    /files`            — list stored files
//!   - `POST   /files`            — multipart upload (`files` field, repeatable)
//!   - `GET    /files/{filename}` — download a file
//!   - `DELETE /files/{filename}` — delete a file

use crate::{
    handlers::{
        file_handlers::{delete_file, get_file, list_files, upload_files},
        health_handlers::{health, root},
    },
    routes::docs::ApiDoc,
    services::storage_service::StorageService,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build and return the router for all API routes.
///
/// The router carries shared state (`StorageService`) to all handlers.
/// Uploads are bounded per file by the pipe, so the request-wide body limit
/// is lifted on `/files`.
pub fn routes() -> Router<StorageService> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/files",
            get(list_files)
                .post(upload_files)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/files/{filename}", get(get_file).delete(delete_file))
}

/// Full application: routes, API docs and middleware (request logging,
/// panic recovery, CORS), bound to `service`.
pub fn app(service: StorageService) -> Router {
    routes()
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
