use crate::models::Asset;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    /// Where the uploaded bytes can be downloaded
    pub url: String,
    pub video_id: String,
    pub metadata: UploadMetadata,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub original_name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub upload_date: DateTime<Utc>,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    pub id: String,
}

impl UploadResponse {
    pub fn from_asset(asset: Asset, download_url: String) -> Self {
        Self {
            success: true,
            url: download_url.clone(),
            video_id: asset.id.clone(),
            metadata: UploadMetadata {
                original_name: asset.original_name,
                size: asset.size,
                content_type: asset.mime_type,
                upload_date: asset.uploaded_at,
                download_url,
                id: asset.id,
            },
        }
    }
}

/// Multipart form accepted by `POST /upload`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The video file, sent with its own Content-Type
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}
