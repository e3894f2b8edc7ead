pub mod health;
pub mod pages;
pub mod types;
pub mod upload;
pub mod videos;

use crate::config::UploadConfig;
use axum::http::{HeaderMap, header};

/// Scheme and authority links are built against: `PUBLIC_ORIGIN` when set,
/// otherwise the request's forwarded or Host headers.
pub fn request_origin(config: &UploadConfig, headers: &HeaderMap) -> String {
    if let Some(origin) = &config.public_origin {
        return origin.clone();
    }

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let scheme = header_str("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = header_str("x-forwarded-host")
        .or_else(|| header_str(header::HOST.as_str()))
        .unwrap_or_else(|| "localhost".to_string());

    format!("{}://{}", scheme, host)
}
