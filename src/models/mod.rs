use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Immutable record of one successfully stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    pub id: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    /// Backend key, `{id}` or `{id}.{ext}`
    pub storage_key: String,
    /// URL or filesystem path reported by the backend
    pub storage_location: String,
}

/// A file part received by the server, fully buffered.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: String,
    pub data: bytes::Bytes,
}

impl IncomingFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
