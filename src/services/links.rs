//! Public addressing scheme for stored assets.

pub fn share_url(origin: &str, id: &str) -> String {
    format!("{}/share/{}", origin.trim_end_matches('/'), id)
}

pub fn watch_url(id: &str) -> String {
    format!("/watch/{}", id)
}

/// Path that serves the asset bytes. Accepts a bare id or a storage key.
pub fn video_url(id: &str) -> String {
    format!("/videos/{}", id)
}
