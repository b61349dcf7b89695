//! Bounded upload pipe.
//!
//! A producer reads the client's file in 32 KiB chunks and pushes them into a
//! small bounded channel; the receiving half is the body of the storage put.
//! Both sides are polled concurrently, so at most a few chunks sit in memory
//! between the client and the backend. When the running total would pass the
//! ceiling the producer sends a terminal abort instead of the chunk, and the
//! store fails the put without creating an object.

use super::object_store::{ObjectStore, StorageError, StreamAbort};
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt, channel::mpsc};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Bytes requested from the client per read.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Chunks buffered between producer and consumer.
const PIPE_DEPTH: usize = 4;

type PipeSender = mpsc::Sender<Result<Bytes, StreamAbort>>;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file '{filename}' exceeds the maximum allowed size of {limit} bytes")]
    SizeExceeded { filename: String, limit: u64 },
    #[error("could not read file '{filename}': {source}")]
    ReadError {
        filename: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Backend(StorageError),
}

/// Where one upload destination lives in the backend.
pub struct UploadTarget<'a> {
    pub store: &'a dyn ObjectStore,
    pub bucket: &'a str,
    pub key: &'a str,
    pub content_type: Option<String>,
}

/// Stream `reader` into `target`, failing once more than `limit` bytes arrive.
/// Returns the number of bytes stored.
pub async fn upload_bounded<R>(
    target: UploadTarget<'_>,
    filename: &str,
    reader: R,
    limit: u64,
) -> Result<u64, UploadError>
where
    R: AsyncRead + Unpin,
{
    let (tx, rx) = mpsc::channel(PIPE_DEPTH);

    let producer = produce(reader, tx, filename, limit);
    let consumer = target
        .store
        .put_object(target.bucket, target.key, target.content_type, rx.boxed());
    let (produced, stored) = futures::join!(producer, consumer);

    // The producer's own error is the precise cause; the store only saw an abort.
    let total = produced?;
    stored.map_err(UploadError::Backend)?;
    Ok(total)
}

async fn produce<R>(
    mut reader: R,
    mut tx: PipeSender,
    filename: &str,
    limit: u64,
) -> Result<u64, UploadError>
where
    R: AsyncRead + Unpin,
{
    let mut total: u64 = 0;

    loop {
        let mut chunk = BytesMut::with_capacity(CHUNK_SIZE);
        let read = match reader.read_buf(&mut chunk).await {
            Ok(0) => {
                debug!(filename, total, "input exhausted");
                return Ok(total);
            }
            Ok(n) => n,
            Err(err) => {
                let _ = tx.send(Err(StreamAbort::Read(err.to_string()))).await;
                return Err(UploadError::ReadError {
                    filename: filename.to_string(),
                    source: err,
                });
            }
        };

        total += read as u64;
        if total > limit {
            let _ = tx.send(Err(StreamAbort::SizeExceeded { limit })).await;
            return Err(UploadError::SizeExceeded {
                filename: filename.to_string(),
                limit,
            });
        }

        if tx.send(Ok(chunk.freeze())).await.is_err() {
            // Consumer hung up; its result carries the failure.
            debug!(filename, total, "upload consumer closed the pipe");
            return Ok(total);
        }
    }
}
