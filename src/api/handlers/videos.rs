use crate::AppState;
use crate::api::error::AppError;
use crate::services::storage::{ObjectAccess, StorageError};
use crate::utils::validation::is_safe_key;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Keys are never reused, so the bytes never change
const IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Outcome of matching a `Range` header against an object of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    Full,
    /// Inclusive on both ends
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Single-range `bytes=` parsing. Multi-range and malformed headers fall back
/// to the full body, which clients must accept.
pub fn parse_range(value: &str, size: u64) -> ByteRange {
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    if spec.contains(',') {
        return ByteRange::Full;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return ByteRange::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    let parsed = match (first.is_empty(), last.is_empty()) {
        // bytes=-N: the last N bytes
        (true, false) => match last.parse::<u64>() {
            Ok(0) => return ByteRange::Unsatisfiable,
            Ok(n) => Some((size.saturating_sub(n), size.saturating_sub(1))),
            Err(_) => None,
        },
        // bytes=N-
        (false, true) => first
            .parse::<u64>()
            .ok()
            .map(|start| (start, size.saturating_sub(1))),
        (false, false) => match (first.parse::<u64>(), last.parse::<u64>()) {
            (Ok(start), Ok(end)) if start <= end => Some((start, end.min(size.saturating_sub(1)))),
            _ => None,
        },
        (true, true) => None,
    };

    match parsed {
        None => ByteRange::Full,
        Some((start, _)) if size == 0 || start >= size => ByteRange::Unsatisfiable,
        Some((start, end)) => ByteRange::Partial { start, end },
    }
}

#[utoipa::path(
    get,
    path = "/videos/{id}",
    params(
        ("id" = String, Path, description = "Video id, or storage key such as `{id}.mp4`")
    ),
    responses(
        (status = 200, description = "Stored video bytes"),
        (status = 206, description = "Requested byte range"),
        (status = 302, description = "Redirect to the object store download URL"),
        (status = 404, description = "Unknown video"),
        (status = 416, description = "Range outside the stored video")
    ),
    tag = "videos"
)]
pub async fn get_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if !is_safe_key(&id) {
        return Err(AppError::NotFound("Video not found".to_string()));
    }

    // Catalogued assets resolve by id or key; anything else is looked up as a
    // raw key so links keep working for objects stored before a restart
    let asset = state.catalog.find(&id);
    let key = asset
        .as_ref()
        .map(|a| a.storage_key.clone())
        .unwrap_or_else(|| id.clone());

    match state.storage.open(&key).await? {
        ObjectAccess::File {
            path,
            size,
            content_type,
        } => {
            let content_type = asset.map(|a| a.mime_type).unwrap_or(content_type);
            let range = headers
                .get(header::RANGE)
                .and_then(|v| v.to_str().ok())
                .map(|v| parse_range(v, size))
                .unwrap_or(ByteRange::Full);

            let builder = Response::builder()
                .header(header::CONTENT_TYPE, content_type)
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CACHE_CONTROL, IMMUTABLE);

            let (start, end) = match range {
                ByteRange::Unsatisfiable => {
                    tracing::debug!("Unsatisfiable range for {} ({} bytes)", key, size);
                    return builder
                        .status(StatusCode::RANGE_NOT_SATISFIABLE)
                        .header(header::CONTENT_RANGE, format!("bytes */{}", size))
                        .body(Body::empty())
                        .map_err(|e| AppError::Internal(e.to_string()));
                }
                ByteRange::Full => (0, size.saturating_sub(1)),
                ByteRange::Partial { start, end } => (start, end),
            };

            let mut file = tokio::fs::File::open(&path)
                .await
                .map_err(StorageError::from)?;
            let length = if size == 0 { 0 } else { end - start + 1 };
            if start > 0 {
                file.seek(SeekFrom::Start(start))
                    .await
                    .map_err(StorageError::from)?;
            }
            let body = Body::from_stream(ReaderStream::new(file.take(length)));

            let builder = builder.header(header::CONTENT_LENGTH, length);
            let builder = if let ByteRange::Partial { .. } = range {
                tracing::debug!("📼 Serving {} bytes {}-{}/{}", key, start, end, size);
                builder
                    .status(StatusCode::PARTIAL_CONTENT)
                    .header(
                        header::CONTENT_RANGE,
                        format!("bytes {}-{}/{}", start, end, size),
                    )
            } else {
                tracing::debug!("📼 Serving {} ({} bytes)", key, size);
                builder.status(StatusCode::OK)
            };

            builder
                .body(body)
                .map_err(|e| AppError::Internal(e.to_string()))
        }
        ObjectAccess::Redirect(url) => {
            tracing::debug!("📎 Redirecting {} to {}", key, url);
            Response::builder()
                .status(StatusCode::FOUND)
                .header(header::LOCATION, url)
                .body(Body::empty())
                .map_err(|e| AppError::Internal(e.to_string()))
        }
        ObjectAccess::NotFound => Err(AppError::NotFound("Video not found".to_string())),
    }
}
