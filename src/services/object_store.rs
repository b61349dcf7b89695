//! The object-store seam consumed by the storage service.
//!
//! `ObjectStore` is the narrow set of bucket operations the HTTP layer needs:
//! list, streamed put, streamed get and delete. The production implementation
//! lives in `s3_store`; tests run against `memory_store`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::io;
use thiserror::Error;

/// Body handed to `put_object`. A terminal `Err` item means the producer gave
/// up and the upload must not complete.
pub type PutBody = BoxStream<'static, Result<Bytes, StreamAbort>>;

/// Body returned by `get_object`.
pub type GetBody = BoxStream<'static, io::Result<Bytes>>;

/// Why a producer stopped feeding a `PutBody` early.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamAbort {
    #[error("input exceeded the limit of {limit} bytes")]
    SizeExceeded { limit: u64 },
    #[error("reading input failed: {0}")]
    Read(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{key}` not found")]
    NotFound { key: String },
    #[error("input stream aborted: {0}")]
    StreamAborted(#[source] StreamAbort),
    #[error("storage backend unavailable during {operation}: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },
}

impl StorageError {
    pub fn backend(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            message: message.into(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// One entry of a bucket listing, in backend order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// A readable object: headers first, bytes streamed afterwards.
pub struct ObjectBody {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: GetBody,
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectSummary>>;

    /// Store `body` under `key`. If `body` yields an error the object must not
    /// exist afterwards and `StorageError::StreamAborted` is returned.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        body: PutBody,
    ) -> StorageResult<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectBody>;

    /// Idempotent: deleting a missing key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;
}
