//! OpenAPI document served behind the Swagger UI.

use crate::{
    errors::ErrorBody,
    handlers::{file_handlers, health_handlers},
    models::file::{FileInfo, HealthResponse, MessageResponse, UploadForm, UploadResponse},
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "File Storage Service API",
        version = "1.0",
        description = "A simple service for storing and retrieving files in an S3-compatible bucket. \
                       Authentication and authorization are handled by the upstream gateway."
    ),
    paths(
        health_handlers::root,
        health_handlers::health,
        file_handlers::list_files,
        file_handlers::upload_files,
        file_handlers::get_file,
        file_handlers::delete_file
    ),
    components(schemas(
        FileInfo,
        UploadForm,
        UploadResponse,
        MessageResponse,
        HealthResponse,
        ErrorBody
    )),
    tags(
        (name = "General", description = "Service information"),
        (name = "Files", description = "File storage operations")
    )
)]
pub struct ApiDoc;
