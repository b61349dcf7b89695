//! HTTP handlers for file operations.
//! Streams file bodies in both directions to avoid buffering in memory and
//! delegates storage concerns to `StorageService`.

use crate::{
    errors::{AppError, ErrorBody},
    handlers::caller::Caller,
    models::file::{FileInfo, UploadForm, UploadResponse},
    services::{
        object_store::StorageError,
        storage_service::StorageService,
        upload_pipe::UploadError,
    },
};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::MultipartRejection,
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::TryStreamExt;
use std::io;
use tokio_util::io::StreamReader;
use tracing::{error, info, warn};

/// Multipart field carrying uploaded files.
const FILES_FIELD: &str = "files";

/// `GET /files`: list every stored file.
#[utoipa::path(
    get,
    path = "/files",
    tag = "Files",
    responses(
        (status = 200, description = "List of files", body = [FileInfo]),
        (status = 500, description = "Failed to list files from storage", body = ErrorBody)
    )
)]
pub async fn list_files(
    State(service): State<StorageService>,
    caller: Caller,
) -> Result<Json<Vec<FileInfo>>, AppError> {
    let objects = service.list_files().await.map_err(|err| {
        error!(user = %caller, error = %err, "listing objects failed");
        AppError::internal("Failed to list files from storage.")
    })?;

    let files: Vec<FileInfo> = objects.into_iter().map(FileInfo::from).collect();
    info!(user = %caller, count = files.len(), "files listed");
    Ok(Json(files))
}

/// `POST /files`: upload one or more files from the `files` multipart field.
///
/// Files are streamed one at a time in submission order. If any file fails,
/// files already stored by this request are deleted again before the error
/// is returned.
#[utoipa::path(
    post,
    path = "/files",
    tag = "Files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Files uploaded", body = UploadResponse),
        (status = 400, description = "No files provided or malformed form", body = ErrorBody),
        (status = 413, description = "A file exceeds the maximum allowed size", body = ErrorBody),
        (status = 500, description = "Could not upload file", body = ErrorBody)
    )
)]
pub async fn upload_files(
    State(service): State<StorageService>,
    caller: Caller,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut multipart = multipart.inspect_err(|rejection| {
        warn!(user = %caller, error = %rejection, "upload is not a multipart form");
    })?;
    let mut uploaded: Vec<String> = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                warn!(user = %caller, error = %err, "malformed multipart body");
                service.discard_files(&uploaded).await;
                return Err(err.into());
            }
        };

        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            warn!(user = %caller, "received an uploaded file without a filename");
            continue;
        }
        let content_type = field.content_type().map(str::to_string);

        let reader = StreamReader::new(field.map_err(io::Error::other));
        tokio::pin!(reader);

        match service.upload_file(&filename, content_type, reader).await {
            Ok(Some(stored)) => {
                info!(
                    user = %caller,
                    filename = %filename,
                    key = %stored.key,
                    size = stored.size_bytes,
                    "file uploaded"
                );
                uploaded.push(stored.key);
            }
            Ok(None) => {
                warn!(user = %caller, filename = %filename, "filename has no usable name, skipped");
            }
            Err(err) => {
                log_upload_failure(&caller, &filename, &err);
                service.discard_files(&uploaded).await;
                return Err(err.into());
            }
        }
    }

    if uploaded.is_empty() {
        return Err(AppError::bad_request("No files provided for upload."));
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "Files uploaded successfully".into(),
            uploaded_files: uploaded,
        }),
    ))
}

/// `GET /files/{filename}`: stream a stored file to the client.
///
/// Errors after the headers are sent can only be logged; the client sees a
/// truncated body.
#[utoipa::path(
    get,
    path = "/files/{filename}",
    tag = "Files",
    params(("filename" = String, Path, description = "Key of the file to retrieve")),
    responses(
        (status = 200, description = "File content streamed from storage"),
        (status = 404, description = "File not found", body = ErrorBody),
        (status = 500, description = "Failed to retrieve file", body = ErrorBody)
    )
)]
pub async fn get_file(
    State(service): State<StorageService>,
    caller: Caller,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let object = match service.open_file(&filename).await {
        Ok(object) => object,
        Err(err @ StorageError::NotFound { .. }) => {
            info!(user = %caller, key = %filename, "attempted to access non-existent file");
            return Err(err.into());
        }
        Err(err) => {
            error!(user = %caller, key = %filename, error = %err, "getting object failed");
            return Err(AppError::internal("Failed to retrieve file."));
        }
    };

    let user = caller.to_string();
    let key = filename.clone();
    let body = object.body.inspect_err(move |err| {
        error!(user = %user, key = %key, error = %err, "streaming file to client failed");
    });

    let mut response = Response::new(Body::from_stream(body));
    set_file_headers(
        response.headers_mut(),
        &filename,
        object.content_type.as_deref(),
        object.content_length,
    );

    info!(user = %caller, key = %filename, "serving file");
    Ok(response)
}

/// `DELETE /files/{filename}`: delete a stored file. Missing keys still yield 204.
#[utoipa::path(
    delete,
    path = "/files/{filename}",
    tag = "Files",
    params(("filename" = String, Path, description = "Key of the file to delete")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 500, description = "Could not delete file", body = ErrorBody)
    )
)]
pub async fn delete_file(
    State(service): State<StorageService>,
    caller: Caller,
    Path(filename): Path<String>,
) -> Result<StatusCode, AppError> {
    service.delete_file(&filename).await.map_err(|err| {
        error!(user = %caller, key = %filename, error = %err, "deleting object failed");
        AppError::internal(format!("Could not delete file '{}'.", filename))
    })?;

    info!(user = %caller, key = %filename, "file deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn log_upload_failure(caller: &Caller, filename: &str, err: &UploadError) {
    match err {
        UploadError::SizeExceeded { limit, .. } => {
            warn!(user = %caller, filename, limit, "upload rejected: file too large");
        }
        UploadError::ReadError { source, .. } => {
            warn!(user = %caller, filename, error = %source, "reading uploaded file failed");
        }
        UploadError::Backend(inner) => {
            error!(user = %caller, filename, error = %inner, "storing uploaded file failed");
        }
    }
}

fn set_file_headers(
    headers: &mut HeaderMap,
    key: &str,
    content_type: Option<&str>,
    content_length: Option<u64>,
) {
    let content_type = content_type
        .and_then(|v| HeaderValue::from_str(v).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);

    if let Some(length) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    // Control characters are not allowed in header values.
    let name: String = key
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .replace('"', "\\\"");
    let disposition = format!("attachment; filename=\"{}\"", name);
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
}
