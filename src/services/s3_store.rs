//! S3-compatible implementation of `ObjectStore` on top of `aws-sdk-s3`.
//!
//! Uploads never leave a partial object behind: bodies that fit in one part
//! are sent with a single `PutObject` only after the input ended cleanly, and
//! larger bodies go through a multipart upload that is aborted on any input
//! or backend failure.

use super::object_store::{
    ObjectBody, ObjectStore, ObjectSummary, PutBody, StorageError, StorageResult,
};
use crate::config::BackendConfig;
use aws_config::{BehaviorVersion, timeout::TimeoutConfig};
use aws_sdk_s3::{
    Client,
    config::Region,
    error::DisplayErrorContext,
    primitives::{ByteStream, DateTime as S3DateTime},
    types::{CompletedMultipartUpload, CompletedPart},
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Size of each multipart part. S3 requires at least 5 MiB for all but the last.
const PART_SIZE: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a client from the default AWS credential chain plus `cfg`.
    pub async fn connect(cfg: &BackendConfig) -> Self {
        let mut timeouts = TimeoutConfig::builder();
        if let Some(timeout) = cfg.connect_timeout {
            timeouts = timeouts.connect_timeout(timeout);
        }
        if let Some(timeout) = cfg.operation_timeout {
            timeouts = timeouts.operation_timeout(timeout);
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .timeout_config(timeouts.build())
            .load()
            .await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(cfg.force_path_style);
        if let Some(endpoint) = &cfg.endpoint {
            info!(endpoint = %endpoint, "using custom S3 endpoint");
            builder = builder.endpoint_url(endpoint);
        }
        if cfg.force_path_style {
            info!("S3 path-style addressing enabled");
        }

        info!(region = %cfg.region, "S3 client initialized");
        Self::new(Client::from_conf(builder.build()))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        data: Bytes,
    ) -> StorageResult<()> {
        debug!(key, size = data.len(), "single-part upload");
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| backend_error("put_object", err))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        buffer: BytesMut,
        body: PutBody,
    ) -> StorageResult<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type)
            .send()
            .await
            .map_err(|err| backend_error("create_multipart_upload", err))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                StorageError::backend("create_multipart_upload", "response carried no upload id")
            })?
            .to_string();

        let result: StorageResult<()> = async {
            let parts = self
                .upload_parts(bucket, key, &upload_id, buffer, body)
                .await?;
            self.client
                .complete_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .multipart_upload(
                    CompletedMultipartUpload::builder()
                        .set_parts(Some(parts))
                        .build(),
                )
                .send()
                .await
                .map_err(|err| backend_error("complete_multipart_upload", err))?;
            Ok(())
        }
        .await;

        if result.is_err() {
            self.abort_multipart(bucket, key, &upload_id).await;
        }
        result
    }

    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        mut buffer: BytesMut,
        mut body: PutBody,
    ) -> StorageResult<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut finished = false;

        loop {
            while !finished && buffer.len() < PART_SIZE {
                match body.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(abort)) => return Err(StorageError::StreamAborted(abort)),
                    None => finished = true,
                }
            }
            if buffer.is_empty() {
                break;
            }

            let part = buffer.split_to(buffer.len().min(PART_SIZE)).freeze();
            let part_number = parts.len() as i32 + 1;
            debug!(key, part_number, size = part.len(), "uploading part");
            let uploaded = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(|err| backend_error("upload_part", err))?;
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
        }

        Ok(parts)
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) {
        if let Err(err) = self
            .client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(
                key,
                upload_id,
                error = %DisplayErrorContext(&err),
                "failed to abort multipart upload"
            );
        } else {
            debug!(key, upload_id, "multipart upload aborted");
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|err| backend_error("list_objects_v2", err))?;

            for obj in resp.contents() {
                let Some(key) = obj.key() else { continue };
                objects.push(ObjectSummary {
                    key: key.to_string(),
                    last_modified: obj
                        .last_modified()
                        .and_then(to_chrono)
                        .unwrap_or_default(),
                });
            }

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        mut body: PutBody,
    ) -> StorageResult<()> {
        // Fill one part before choosing between a single put and multipart.
        let mut buffer = BytesMut::new();
        while buffer.len() < PART_SIZE {
            match body.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                Some(Err(abort)) => return Err(StorageError::StreamAborted(abort)),
                None => {
                    return self
                        .put_single(bucket, key, content_type, buffer.freeze())
                        .await;
                }
            }
        }
        self.put_multipart(bucket, key, content_type, buffer, body)
            .await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectBody> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|service_err| service_err.is_no_such_key())
                {
                    StorageError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    backend_error("get_object", err)
                }
            })?;

        let content_type = resp.content_type().map(str::to_string);
        let content_length = resp
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        let body = ReaderStream::new(resp.body.into_async_read()).boxed();

        Ok(ObjectBody {
            content_type,
            content_length,
            body,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| backend_error("delete_object", err))?;
        Ok(())
    }
}

fn backend_error<E>(operation: &'static str, err: E) -> StorageError
where
    E: std::error::Error,
{
    StorageError::backend(operation, DisplayErrorContext(&err).to_string())
}

fn to_chrono(ts: &S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::object_store::StreamAbort;
    use aws_sdk_s3::operation::{
        abort_multipart_upload::AbortMultipartUploadOutput,
        complete_multipart_upload::CompleteMultipartUploadOutput,
        create_multipart_upload::CreateMultipartUploadOutput, put_object::PutObjectOutput,
        upload_part::UploadPartOutput,
    };
    use aws_smithy_mocks::{Rule, RuleMode, mock, mock_client};
    use futures::stream;

    const MIB: usize = 1024 * 1024;

    struct Calls {
        put: Rule,
        create: Rule,
        part: Rule,
        complete: Rule,
        abort: Rule,
    }

    impl Calls {
        fn new() -> Self {
            Self {
                put: mock!(aws_sdk_s3::Client::put_object)
                    .then_output(|| PutObjectOutput::builder().build()),
                create: mock!(aws_sdk_s3::Client::create_multipart_upload).then_output(|| {
                    CreateMultipartUploadOutput::builder()
                        .upload_id("upload-1")
                        .build()
                }),
                part: mock!(aws_sdk_s3::Client::upload_part)
                    .then_output(|| UploadPartOutput::builder().e_tag("\"etag\"").build()),
                complete: mock!(aws_sdk_s3::Client::complete_multipart_upload)
                    .then_output(|| CompleteMultipartUploadOutput::builder().build()),
                abort: mock!(aws_sdk_s3::Client::abort_multipart_upload)
                    .then_output(|| AbortMultipartUploadOutput::builder().build()),
            }
        }

        fn store(&self) -> S3Store {
            S3Store::new(mock_client!(
                aws_sdk_s3,
                RuleMode::MatchAny,
                [
                    &self.put,
                    &self.create,
                    &self.part,
                    &self.complete,
                    &self.abort
                ]
            ))
        }

        /// (put, create, part, complete, abort)
        fn counts(&self) -> (usize, usize, usize, usize, usize) {
            (
                self.put.num_calls(),
                self.create.num_calls(),
                self.part.num_calls(),
                self.complete.num_calls(),
                self.abort.num_calls(),
            )
        }
    }

    fn mib_chunks(count: usize) -> Vec<Result<Bytes, StreamAbort>> {
        (0..count).map(|_| Ok(Bytes::from(vec![0u8; MIB]))).collect()
    }

    fn body(chunks: Vec<Result<Bytes, StreamAbort>>) -> PutBody {
        stream::iter(chunks).boxed()
    }

    #[tokio::test]
    async fn small_body_is_a_single_put() {
        let calls = Calls::new();

        calls
            .store()
            .put_object("bucket", "k", None, body(mib_chunks(3)))
            .await
            .unwrap();

        assert_eq!(calls.counts(), (1, 0, 0, 0, 0));
    }

    #[tokio::test]
    async fn abort_before_a_full_part_sends_nothing() {
        let calls = Calls::new();
        let mut chunks = mib_chunks(2);
        chunks.push(Err(StreamAbort::SizeExceeded { limit: 2 * MIB as u64 }));

        let err = calls
            .store()
            .put_object("bucket", "k", None, body(chunks))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::StreamAborted(StreamAbort::SizeExceeded { .. })
        ));
        assert_eq!(calls.counts(), (0, 0, 0, 0, 0));
    }

    #[tokio::test]
    async fn one_full_part_completes_a_multipart_upload() {
        let calls = Calls::new();

        calls
            .store()
            .put_object("bucket", "k", None, body(mib_chunks(PART_SIZE / MIB)))
            .await
            .unwrap();

        assert_eq!(calls.counts(), (0, 1, 1, 1, 0));
    }

    #[tokio::test]
    async fn abort_after_a_part_aborts_the_multipart_upload() {
        let calls = Calls::new();
        let mut chunks = mib_chunks(PART_SIZE / MIB + 1);
        chunks.push(Err(StreamAbort::SizeExceeded {
            limit: PART_SIZE as u64 + MIB as u64,
        }));

        let err = calls
            .store()
            .put_object("bucket", "k", None, body(chunks))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::StreamAborted(StreamAbort::SizeExceeded { .. })
        ));
        assert_eq!(calls.counts(), (0, 1, 1, 0, 1));
    }
}
