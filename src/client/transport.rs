use crate::client::controller::{FileSource, SelectedFile};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use url::Url;

const CHUNK_SIZE: usize = 64 * 1024;

/// Called with the total number of body bytes handed to the network so far.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error! status: {0}")]
    Http(u16),

    /// The server answered with a failure body carrying its own message
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReply {
    pub video_id: String,
    pub url: String,
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(
        &self,
        file: &SelectedFile,
        on_progress: ProgressFn,
    ) -> Result<UploadReply, TransferError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyBody {
    #[serde(default)]
    success: bool,
    video_id: Option<String>,
    url: Option<String>,
    error: Option<String>,
}

/// Multipart upload to `POST {server}/upload`, streamed from disk.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    upload_url: Url,
}

impl HttpTransport {
    pub fn new(server: &Url) -> Result<Self, TransferError> {
        let upload_url = server
            .join("upload")
            .map_err(|e| TransferError::Network(format!("invalid server url: {}", e)))?;

        Ok(Self {
            client: reqwest::Client::new(),
            upload_url,
        })
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }
}

type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

async fn chunks(source: &FileSource) -> Result<ChunkStream, TransferError> {
    match source {
        FileSource::Path(path) => {
            let file = tokio::fs::File::open(path).await?;
            Ok(Box::pin(ReaderStream::with_capacity(file, CHUNK_SIZE)))
        }
        FileSource::Memory(data) => {
            let data = data.clone();
            let pieces: Vec<std::io::Result<Bytes>> = (0..data.len())
                .step_by(CHUNK_SIZE)
                .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
                .collect();
            Ok(Box::pin(futures::stream::iter(pieces)))
        }
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn send(
        &self,
        file: &SelectedFile,
        on_progress: ProgressFn,
    ) -> Result<UploadReply, TransferError> {
        let sent = Arc::new(AtomicU64::new(0));
        let counted = chunks(&file.source).await?.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                let total = sent.fetch_add(bytes.len() as u64, Ordering::SeqCst)
                    + bytes.len() as u64;
                on_progress(total);
            }
            chunk
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(counted), file.size)
            .file_name(file.name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| TransferError::Network(e.to_string()))?;
        let form = Form::new().part("file", part);

        tracing::debug!("POST {} ({} bytes)", self.upload_url, file.size);
        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransferError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransferError::Network(e.to_string()))?;

        let parsed: Option<ReplyBody> = serde_json::from_slice(&body).ok();

        if !status.is_success() {
            return Err(match parsed.and_then(|b| b.error) {
                Some(message) => TransferError::Rejected {
                    status: status.as_u16(),
                    message,
                },
                None => TransferError::Http(status.as_u16()),
            });
        }

        let reply = parsed.ok_or_else(|| {
            TransferError::InvalidResponse("upload response is not JSON".to_string())
        })?;

        match reply {
            ReplyBody {
                success: true,
                video_id: Some(video_id),
                url,
                ..
            } => Ok(UploadReply {
                video_id,
                url: url.unwrap_or_default(),
            }),
            ReplyBody {
                error: Some(message),
                ..
            } => Err(TransferError::Rejected {
                status: status.as_u16(),
                message,
            }),
            _ => Err(TransferError::InvalidResponse(
                "upload response has no video id".to_string(),
            )),
        }
    }
}
