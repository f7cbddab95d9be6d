use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on keys per delete-many call, matching the S3 API limit.
pub const DELETE_BATCH_MAX_KEYS: usize = 1000;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// Body of a single-object write. A `File` payload is opened by the backend
/// at send time so large uploads are never buffered in memory.
pub enum ObjectBody {
    Bytes(bytes::Bytes),
    File(PathBuf),
}

impl From<Vec<u8>> for ObjectBody {
    fn from(data: Vec<u8>) -> Self {
        ObjectBody::Bytes(data.into())
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Batched delete in quiet mode: per-key failures (including missing
    /// keys) are logged, only a failed batch call is an error.
    async fn delete_objects(&self, keys: &[String]) -> Result<(), StorageError>;

    async fn get_object(&self, key: &str) -> Result<ByteStream, StorageError>;

    /// Time-limited GET URL for direct reads without further authorization.
    async fn presigned_get_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let body = match body {
            ObjectBody::Bytes(bytes) => ByteStream::from(bytes),
            ObjectBody::File(path) => ByteStream::from_path(&path)
                .await
                .map_err(|e| StorageError::Unavailable(e.to_string()))?,
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), StorageError> {
        for chunk in keys.chunks(DELETE_BATCH_MAX_KEYS) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;

            // Quiet mode only reports per-key failures
            for error in output.errors() {
                tracing::warn!(
                    key = error.key().unwrap_or("?"),
                    code = error.code().unwrap_or("?"),
                    "batched delete reported a failed key"
                );
            }
        }
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<ByteStream, StorageError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(output.body),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Err(StorageError::NotFound(key.to_string()))
                } else {
                    Err(StorageError::Unavailable(service_error.to_string()))
                }
            }
        }
    }

    async fn presigned_get_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let presigning_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        Ok(presigned_request.uri().to_string())
    }
}
