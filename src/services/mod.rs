//! Storage-facing services: the object-store seam, its S3 implementation,
//! the bounded upload pipe and the `StorageService` handed to handlers.

#[cfg(test)]
pub mod memory_store;
pub mod object_store;
pub mod s3_store;
pub mod storage_service;
pub mod upload_pipe;
