use crate::traits::{MultipartUpload, ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;
use std::time::{Duration, Instant};
use streamhub_core::models::CompletedPart;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    bucket_url: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region
    /// * `bucket_url` - public base URL objects are served from
    /// * `endpoint_url` - optional custom endpoint for S3-compatible providers
    ///   (e.g. "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        bucket_url: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        if bucket.is_empty() {
            return Err(StorageError::ConfigError("bucket name is empty".into()));
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self::from_client(
            Client::from_conf(builder.build()),
            bucket,
            bucket_url,
        ))
    }

    pub fn from_client(client: Client, bucket: String, bucket_url: String) -> Self {
        Self {
            client,
            bucket,
            bucket_url: bucket_url.trim_end_matches('/').to_string(),
        }
    }

    fn presigning(expires_in: Duration) -> StorageResult<PresigningConfig> {
        PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn create_multipart(&self, key: &str, content_type: &str) -> StorageResult<String> {
        let start = Instant::now();
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 create_multipart_upload failed"
                );
                StorageError::UploadFailed(DisplayErrorContext(&e).to_string())
            })?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| StorageError::BackendError("missing upload id".into()))?
            .to_string();

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            upload_id = %upload_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload created"
        );

        Ok(upload_id)
    }

    async fn list_multipart_uploads(&self, prefix: &str) -> StorageResult<Vec<MultipartUpload>> {
        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;

        loop {
            let output = self
                .client
                .list_multipart_uploads()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_key_marker(key_marker.take())
                .set_upload_id_marker(upload_id_marker.take())
                .send()
                .await
                .map_err(|e| StorageError::BackendError(DisplayErrorContext(&e).to_string()))?;

            uploads.extend(output.uploads().iter().filter_map(|u| {
                Some(MultipartUpload {
                    key: u.key()?.to_string(),
                    upload_id: u.upload_id()?.to_string(),
                })
            }));

            if !output.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = output.next_key_marker().map(str::to_string);
            upload_id_marker = output.next_upload_id_marker().map(str::to_string);
            if key_marker.is_none() && upload_id_marker.is_none() {
                break;
            }
        }

        Ok(uploads)
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let request = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(Self::presigning(expires_in)?)
            .await
            .map_err(|e| StorageError::PresignFailed(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let start = Instant::now();
        let mut sorted: Vec<&CompletedPart> = parts.iter().collect();
        sorted.sort_by_key(|p| p.part_number);

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                sorted
                    .into_iter()
                    .map(|p| {
                        S3CompletedPart::builder()
                            .part_number(p.part_number)
                            .e_tag(&p.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    parts = parts.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 complete_multipart_upload failed"
                );
                StorageError::UploadFailed(DisplayErrorContext(&e).to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            parts = parts.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload completed"
        );

        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| StorageError::BackendError(DisplayErrorContext(&e).to_string()))?;

        tracing::info!(bucket = %self.bucket, key = %key, "S3 multipart upload aborted");
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(Self::presigning(expires_in)?)
            .await
            .map_err(|e| StorageError::PresignFailed(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(Self::presigning(expires_in)?)
            .await
            .map_err(|e| StorageError::PresignFailed(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let start = Instant::now();
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    "S3 delete failed"
                );
                StorageError::DeleteFailed(DisplayErrorContext(&e).to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );
        Ok(())
    }

    fn bucket_url(&self) -> &str {
        &self.bucket_url
    }
}
