use std::path::{Component, Path as FsPath};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use url::Url;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Storage namespace a file lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Posts,
    Avatars,
}

impl Bucket {
    /// Unknown names fall back to `posts`.
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "avatars" => Bucket::Avatars,
            _ => Bucket::Posts,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Posts => "posts",
            Bucket::Avatars => "avatars",
        }
    }

    /// Avatars take images only; post media may also be video.
    pub fn accepts(&self, mime: &str) -> bool {
        match self {
            Bucket::Avatars => mime.starts_with("image/"),
            Bucket::Posts => mime.starts_with("image/") || mime.starts_with("video/"),
        }
    }
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub url: String,
}

struct UploadedFile {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/upload",
            // Leave room for the multipart framing around the file itself
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024)),
        )
        .route("/uploads/{*path}", get(serve))
}

/// Lowercased extension of the client's file name, `jpg` when it has none.
fn extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string())
}

fn public_file_url(base: &str, relative: &str) -> AppResult<String> {
    let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))
        .map_err(|e| AppError::Internal(format!("invalid public_url: {}", e)))?;
    let url = base
        .join(relative)
        .map_err(|e| AppError::Internal(format!("invalid upload path: {}", e)))?;
    Ok(url.to_string())
}

async fn upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut bucket = Bucket::Posts;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("bucket") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                bucket = Bucket::parse(&value);
            }
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("No file provided".into()))?;
    if file.data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest("File exceeds the 10 MB limit".into()));
    }

    let mime = file
        .content_type
        .clone()
        .filter(|m| m != "application/octet-stream")
        .or_else(|| {
            file.file_name
                .as_deref()
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|m| m.to_string())
        })
        .unwrap_or_default();
    if !bucket.accepts(&mime) {
        return Err(AppError::BadRequest(format!(
            "Unsupported file type for {}",
            bucket.as_str()
        )));
    }

    let name = format!(
        "{}.{}",
        chrono::Utc::now().timestamp_millis(),
        extension(file.file_name.as_deref())
    );
    let dir = state
        .config
        .uploads_path()
        .join(bucket.as_str())
        .join(&user.id);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(format!("create upload dir: {}", e)))?;
    tokio::fs::write(dir.join(&name), &file.data)
        .await
        .map_err(|e| AppError::Internal(format!("write upload: {}", e)))?;

    tracing::info!(
        "{} uploaded {} bytes to {}/{}",
        user.username,
        file.data.len(),
        bucket.as_str(),
        name
    );

    let relative = format!("uploads/{}/{}/{}", bucket.as_str(), user.id, name);
    let url = public_file_url(&state.config.public_url(), &relative)?;
    Ok(Json(UploadResponse { url }))
}

/// Serves stored files. Only plain relative paths are accepted.
async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    let relative = FsPath::new(&path);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(state.config.uploads_path().join(relative)).await {
        Ok(data) => {
            let mime = mime_guess::from_path(relative).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                data,
            )
                .into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_bucket_falls_back_to_posts() {
        assert_eq!(Bucket::parse("avatars"), Bucket::Avatars);
        assert_eq!(Bucket::parse("posts"), Bucket::Posts);
        assert_eq!(Bucket::parse("../etc"), Bucket::Posts);
    }

    #[test]
    fn avatars_take_images_only() {
        assert!(Bucket::Avatars.accepts("image/png"));
        assert!(!Bucket::Avatars.accepts("video/mp4"));
        assert!(Bucket::Posts.accepts("video/mp4"));
        assert!(!Bucket::Posts.accepts("application/pdf"));
    }

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(extension(Some("Photo.PNG")), "png");
        assert_eq!(extension(Some("noext")), "jpg");
        assert_eq!(extension(Some("evil.p/hp")), "jpg");
        assert_eq!(extension(None), "jpg");
    }

    #[test]
    fn public_url_joins_under_base_path() {
        assert_eq!(
            public_file_url("https://gains.example/app/", "uploads/posts/u/1.jpg").unwrap(),
            "https://gains.example/app/uploads/posts/u/1.jpg"
        );
        assert_eq!(
            public_file_url("http://localhost:3000", "uploads/avatars/u/2.png").unwrap(),
            "http://localhost:3000/uploads/avatars/u/2.png"
        );
    }
}
