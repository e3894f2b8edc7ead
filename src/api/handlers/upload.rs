use crate::AppState;
use crate::api::error::{UploadErrorResponse, UploadFailure};
use crate::api::handlers::request_origin;
use crate::models::IncomingFile;
use crate::services::links::video_url;
use crate::services::upload_service::UploadError;
use crate::utils::validation::ValidationError;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::{HeaderMap, StatusCode},
};
use bytes::BytesMut;

use super::types::*;

/// Name of the multipart field carrying the video.
pub const FILE_FIELD: &str = "file";

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Single video upload"),
    responses(
        (status = 200, description = "Video stored", body = UploadResponse),
        (status = 400, description = "No file, several files or not a video", body = UploadErrorResponse),
        (status = 413, description = "File larger than the configured limit", body = UploadErrorResponse),
        (status = 500, description = "Storage backend failure", body = UploadErrorResponse)
    ),
    tag = "videos"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, UploadFailure> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Rejected upload request: {}", e);
        UploadFailure(UploadError::NoFile)
    })?;

    let max_size = state.upload_service.validator().max_size();

    let received = read_single_file(&mut multipart, max_size).await;
    let file = match received {
        Ok(file) => file,
        Err(e) => {
            // Consume the rest of the body so the client sees our response
            // instead of a connection reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e.0);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            return Err(e);
        }
    };

    let asset = state.upload_service.handle_upload(file).await?;

    let download_url = if asset.storage_location.starts_with("http://")
        || asset.storage_location.starts_with("https://")
    {
        asset.storage_location.clone()
    } else {
        format!(
            "{}{}",
            request_origin(&state.config, &headers),
            video_url(&asset.storage_key)
        )
    };

    Ok(Json(UploadResponse::from_asset(asset, download_url)))
}

/// Buffers the `file` part, stopping as soon as it passes `max_size`.
/// Other fields are skipped; a second file part is an error.
async fn read_single_file(
    multipart: &mut Multipart,
    max_size: usize,
) -> Result<Option<IncomingFile>, UploadFailure> {
    let mut file: Option<IncomingFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_failure(e, max_size))?
    {
        if field.name() != Some(FILE_FIELD) {
            while field
                .chunk()
                .await
                .map_err(|e| multipart_failure(e, max_size))?
                .is_some()
            {}
            continue;
        }

        if file.is_some() {
            return Err(UploadFailure(UploadError::MultipleFiles));
        }

        let original_name = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
            .to_string();
        let data = read_capped(&mut field, max_size).await?;

        tracing::debug!(
            "Received file part name={} type={} size={}",
            original_name,
            content_type,
            data.len()
        );

        file = Some(IncomingFile {
            original_name,
            content_type,
            data: data.freeze(),
        });
    }

    Ok(file)
}

async fn read_capped(field: &mut Field<'_>, max_size: usize) -> Result<BytesMut, UploadFailure> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_failure(e, max_size))?
    {
        data.extend_from_slice(&chunk);
        if data.len() > max_size {
            return Err(ValidationError::SizeExceeded {
                size: data.len(),
                max_size,
            }
            .into());
        }
    }
    Ok(data)
}

fn multipart_failure(err: MultipartError, max_size: usize) -> UploadFailure {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::SizeExceeded {
            size: max_size + 1,
            max_size,
        }
        .into()
    } else {
        tracing::warn!("Malformed multipart body: {}", err);
        UploadFailure(UploadError::NoFile)
    }
}
