use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::request_origin;
use crate::models::Asset;
use crate::services::links::{share_url, video_url, watch_url};
use crate::utils::html::escape;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Html,
};

fn find_asset(state: &AppState, id: &str) -> Result<Asset, AppError> {
    state
        .catalog
        .get(id)
        .ok_or_else(|| AppError::NotFound("Video not found".to_string()))
}

#[utoipa::path(
    get,
    path = "/watch/{id}",
    params(
        ("id" = String, Path, description = "Video id")
    ),
    responses(
        (status = 200, description = "HTML player page"),
        (status = 404, description = "Unknown video")
    ),
    tag = "pages"
)]
pub async fn watch_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let asset = find_asset(&state, &id)?;
    let origin = request_origin(&state.config, &headers);
    Ok(Html(render_watch(&asset, &share_url(&origin, &asset.id))))
}

#[utoipa::path(
    get,
    path = "/share/{id}",
    params(
        ("id" = String, Path, description = "Video id")
    ),
    responses(
        (status = 200, description = "HTML share landing page"),
        (status = 404, description = "Unknown video")
    ),
    tag = "pages"
)]
pub async fn share_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let asset = find_asset(&state, &id)?;
    let origin = request_origin(&state.config, &headers);
    Ok(Html(render_share(&asset, &origin)))
}

pub fn render_watch(asset: &Asset, share_link: &str) -> String {
    let title = escape(&asset.original_name);
    let src = escape(&video_url(&asset.storage_key));
    let mime = escape(&asset.mime_type);
    let share_link = escape(share_link);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
<main>
<h1>{title}</h1>
<video controls autoplay playsinline style="max-width:100%">
<source src="{src}" type="{mime}">
Your browser does not support the video tag.
</video>
<p>Share: <input type="text" readonly value="{share_link}" onclick="this.select()"></p>
</main>
</body>
</html>
"#
    )
}

pub fn render_share(asset: &Asset, origin: &str) -> String {
    let title = escape(&asset.original_name);
    let link = escape(&share_url(origin, &asset.id));
    let watch = escape(&watch_url(&asset.id));
    let video = escape(&format!("{}{}", origin, video_url(&asset.storage_key)));
    let mime = escape(&asset.mime_type);
    let size_mb = asset.size as f64 / (1024.0 * 1024.0);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<meta property="og:type" content="video.other">
<meta property="og:title" content="{title}">
<meta property="og:url" content="{link}">
<meta property="og:video" content="{video}">
<meta property="og:video:type" content="{mime}">
</head>
<body>
<main>
<h1>{title}</h1>
<p>{size_mb:.2} MB, shared video</p>
<p><a href="{watch}">Watch video</a></p>
<p><input type="text" readonly value="{link}" onclick="this.select()"></p>
</main>
</body>
</html>
"#
    )
}
