use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Backend(String),
}

/// How a stored object can be handed to a client.
#[derive(Debug)]
pub enum ObjectAccess {
    /// The object is a file on local disk that can be streamed directly
    File {
        path: PathBuf,
        size: u64,
        content_type: String,
    },
    /// The client should fetch the object from this URL
    Redirect(String),
    NotFound,
}

/// Durable blob storage behind the upload pipeline.
///
/// `put` is atomic from the caller's point of view and never replaces an
/// existing object. Implementations must be safe for concurrent calls with
/// distinct keys.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs and `/health`
    fn name(&self) -> &'static str;

    /// Stores `data` under `key` and returns its location reference.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String, StorageError>;

    /// Location reference for `key`. Pure; does not require a prior `put`.
    fn resolve_location(&self, key: &str) -> String;

    async fn open(&self, key: &str) -> Result<ObjectAccess, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// S3-compatible object store.
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3Storage {
    /// `public_url` is the base objects are downloadable from, without trailing slash.
    pub fn new(client: Client, bucket: String, public_url: String) -> Self {
        Self {
            client,
            bucket,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

fn backend_error<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::Backend(err.to_string())
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String, StorageError> {
        let size = data.len();
        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            // Rejected by the store when the key is already taken
            .if_none_match("*")
            .body(ByteStream::from(data))
            .send()
            .await;

        if let Err(e) = res {
            let service_error = e.into_service_error();
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                self.bucket,
                key,
                service_error
            );
            return Err(backend_error(service_error));
        }

        tracing::debug!(bucket = %self.bucket, key = %key, size, "Stored object");
        Ok(self.resolve_location(key))
    }

    fn resolve_location(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }

    async fn open(&self, key: &str) -> Result<ObjectAccess, StorageError> {
        if self.exists(key).await? {
            Ok(ObjectAccess::Redirect(self.resolve_location(key)))
        } else {
            Ok(ObjectAccess::NotFound)
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(backend_error(service_error))
                }
            }
        }
    }
}
