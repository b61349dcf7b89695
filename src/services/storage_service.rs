//! src/services/storage_service.rs
//!
//! StorageService — the file operations behind the HTTP handlers. It owns the
//! object store handle, the bucket every file lives in and the per-file size
//! ceiling, and is cloned into each request as router state.

use super::{
    object_store::{ObjectBody, ObjectStore, ObjectSummary, StorageResult},
    upload_pipe::{UploadError, UploadTarget, upload_bounded},
};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, warn};
use uuid::Uuid;

/// Result of one completed upload session.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub key: String,
    pub size_bytes: u64,
}

#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    max_file_size: u64,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, max_file_size: u64) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            max_file_size,
        }
    }

    /// List stored files in backend order, skipping directory markers.
    pub async fn list_files(&self) -> StorageResult<Vec<ObjectSummary>> {
        let objects = self.store.list_objects(&self.bucket).await?;
        Ok(objects
            .into_iter()
            .filter(|obj| !is_directory_marker(&obj.key))
            .collect())
    }

    /// Stream one client file into a freshly minted key.
    ///
    /// Returns `Ok(None)` when `filename` has no usable name component.
    pub async fn upload_file<R>(
        &self,
        filename: &str,
        content_type: Option<String>,
        reader: R,
    ) -> Result<Option<StoredFile>, UploadError>
    where
        R: AsyncRead + Unpin,
    {
        let Some(key) = object_key(filename) else {
            return Ok(None);
        };

        let target = UploadTarget {
            store: self.store.as_ref(),
            bucket: &self.bucket,
            key: &key,
            content_type,
        };
        let size_bytes = upload_bounded(target, filename, reader, self.max_file_size).await?;

        Ok(Some(StoredFile { key, size_bytes }))
    }

    pub async fn open_file(&self, key: &str) -> StorageResult<ObjectBody> {
        self.store.get_object(&self.bucket, key).await
    }

    pub async fn delete_file(&self, key: &str) -> StorageResult<()> {
        self.store.delete_object(&self.bucket, key).await
    }

    /// Best-effort removal of files stored earlier in a failed batch.
    pub async fn discard_files(&self, keys: &[String]) {
        for key in keys {
            match self.store.delete_object(&self.bucket, key).await {
                Ok(()) => debug!(key = %key, "discarded file from failed batch"),
                Err(err) => warn!(key = %key, error = %err, "could not discard file from failed batch"),
            }
        }
    }
}

/// Keys ending in `/` are folder placeholders, not files.
pub fn is_directory_marker(key: &str) -> bool {
    key.ends_with('/')
}

/// Mint a unique key `<uuid>_<basename>` for a client-supplied filename.
pub fn object_key(filename: &str) -> Option<String> {
    base_name(filename).map(|name| format!("{}_{}", Uuid::new_v4(), name))
}

/// Last path component of `filename`, accepting both `/` and `\` separators.
fn base_name(filename: &str) -> Option<&str> {
    filename
        .split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .last()
        .filter(|part| !matches!(*part, "." | ".."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory_store::MemoryStore;

    fn service(store: Arc<MemoryStore>, limit: u64) -> StorageService {
        StorageService::new(store, "bucket", limit)
    }

    #[test]
    fn base_name_strips_client_paths() {
        assert_eq!(base_name("a.txt"), Some("a.txt"));
        assert_eq!(base_name("dir/sub/a.txt"), Some("a.txt"));
        assert_eq!(base_name(r"C:\Users\me\report.pdf"), Some("report.pdf"));
        assert_eq!(base_name("dir/"), Some("dir"));
        assert_eq!(base_name(""), None);
        assert_eq!(base_name("/"), None);
        assert_eq!(base_name("../.."), None);
    }

    #[test]
    fn object_keys_are_unique_per_call() {
        let first = object_key("a.txt").unwrap();
        let second = object_key("a.txt").unwrap();

        assert_ne!(first, second);
        for key in [&first, &second] {
            let (prefix, name) = key.split_once('_').unwrap();
            assert!(Uuid::parse_str(prefix).is_ok());
            assert_eq!(name, "a.txt");
        }
    }

    #[tokio::test]
    async fn list_skips_directory_markers() {
        let store = Arc::new(MemoryStore::new());
        store.insert("bucket", "photos/", b"");
        store.insert("bucket", "photos/cat.png", b"meow");
        store.insert("other", "elsewhere.txt", b"x");

        let files = service(store, 10).list_files().await.unwrap();
        let keys: Vec<_> = files.iter().map(|f| f.key.as_str()).collect();

        assert_eq!(keys, vec!["photos/cat.png"]);
    }

    #[tokio::test]
    async fn upload_then_discard_removes_the_object() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone(), 1024);

        let stored = svc
            .upload_file("notes.txt", None, &b"hello"[..])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.size_bytes, 5);
        assert!(stored.key.ends_with("_notes.txt"));
        assert_eq!(store.data("bucket", &stored.key).unwrap(), &b"hello"[..]);

        svc.discard_files(&[stored.key.clone()]).await;
        assert!(store.keys("bucket").is_empty());
    }

    #[tokio::test]
    async fn unnamed_upload_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let stored = service(store.clone(), 1024)
            .upload_file("/", None, &b"data"[..])
            .await
            .unwrap();

        assert!(stored.is_none());
        assert!(store.keys("bucket").is_empty());
    }
}
