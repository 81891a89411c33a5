use std::path::{Component, Path as FsPath};

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;

use crate::state::AppState;

#[derive(Embed)]
#[folder = "assets/"]
struct Assets;

fn file_response(path: &str, data: Vec<u8>, max_age: u32) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, format!("public, max-age={}", max_age)),
        ],
        data,
    )
        .into_response()
}

/// GET /assets/{*path} - stylesheet and other files compiled into the binary.
pub async fn serve(Path(path): Path<String>) -> Response {
    match Assets::get(&path) {
        Some(file) => file_response(&path, file.data.to_vec(), 86400),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /media/{*path} - uploaded post images from the storage directory.
pub async fn serve_media(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let relative = FsPath::new(&path);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        tracing::warn!("Rejected media path {}", path);
        return StatusCode::NOT_FOUND.into_response();
    }

    let full = state.config.media_path().join(relative);
    match tokio::fs::read(&full).await {
        Ok(data) => file_response(&path, data, 3600),
        Err(e) => {
            tracing::debug!("Media {} unavailable: {}", full.display(), e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
