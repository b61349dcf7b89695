//! Represents a stored file as reported to clients.

use crate::services::object_store::ObjectSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One entry of `GET /files`.
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct FileInfo {
    /// Object key, usable with `GET /files/{filename}`.
    pub filename: String,

    /// Route serving the file content.
    pub path: String,

    /// Last-modified timestamp assigned by the backend.
    pub uploaded_at: DateTime<Utc>,
}

impl From<ObjectSummary> for FileInfo {
    fn from(obj: ObjectSummary) -> Self {
        Self {
            path: format!("/files/{}", obj.key),
            filename: obj.key,
            uploaded_at: obj.last_modified,
        }
    }
}

/// Body of a successful `POST /files`.
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// Generated keys, in submission order.
    pub uploaded_files: Vec<String>,
}

/// Multipart form accepted by `POST /files`; documentation only.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// One or more files, each sent as a binary part.
    #[schema(value_type = Vec<String>)]
    pub files: Vec<Vec<u8>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
