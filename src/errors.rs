use crate::services::{object_store::StorageError, upload_pipe::UploadError};
use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            status: self.status.as_u16(),
        });

        (self.status, body).into_response()
    }
}

/// Backend details stay in the log; clients get a generic message.
impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => {
                AppError::not_found(format!("File '{}' not found.", key))
            }
            StorageError::StreamAborted(_) | StorageError::Backend { .. } => {
                AppError::internal("Storage backend unavailable.")
            }
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::SizeExceeded { .. } => AppError::payload_too_large(err.to_string()),
            // A broken form surfaces through the field reader; keep its own status.
            UploadError::ReadError { filename, source } => match source
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<MultipartError>())
            {
                Some(multipart) => multipart_error(multipart),
                None => AppError::internal(format!("Could not upload file '{}'", filename)),
            },
            UploadError::Backend(inner) => inner.into(),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        multipart_error(&err)
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::new(
            rejection.status(),
            format!("Failed to parse multipart form: {}", rejection.body_text()),
        )
    }
}

fn multipart_error(err: &MultipartError) -> AppError {
    AppError::new(
        err.status(),
        format!("Failed to parse multipart form: {}", err.body_text()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::object_store::StreamAbort;

    #[test]
    fn size_exceeded_maps_to_413() {
        let err: AppError = UploadError::SizeExceeded {
            filename: "big.iso".into(),
            limit: 10,
        }
        .into();

        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(err.message.contains("big.iso"));
    }

    #[test]
    fn storage_errors_map_to_404_and_500() {
        let missing: AppError = StorageError::NotFound { key: "k".into() }.into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let down: AppError = StorageError::backend("get_object", "dns failure").into();
        assert_eq!(down.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!down.message.contains("dns failure"));

        let aborted: AppError =
            UploadError::Backend(StorageError::StreamAborted(StreamAbort::Read("reset".into())))
                .into();
        assert_eq!(aborted.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn plain_read_failure_stays_a_server_error() {
        let err: AppError = UploadError::ReadError {
            filename: "a.txt".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        }
        .into();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("a.txt"));
    }
}
