use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Shared state for static file serving
pub struct StaticAppState {
    /// Lookup roots in priority order. The first entry takes the full
    /// request path; the rest are tried with the file's basename only,
    /// so `/style.css` still resolves when the file lives in the css
    /// directory.
    pub dirs: Vec<PathBuf>,
}

impl StaticAppState {
    pub fn new(dirs: &[String]) -> Self {
        Self {
            dirs: dirs.iter().map(PathBuf::from).collect(),
        }
    }
}

/// Create static file router (registered as the merged app's fallback)
pub fn create_static_router(state: Arc<StaticAppState>) -> Router {
    Router::new().fallback(serve_static).with_state(state)
}

/// Serve a file from the configured roots, first hit wins.
async fn serve_static(State(state): State<Arc<StaticAppState>>, uri: Uri) -> Response {
    let path = uri.path();
    if path.contains("..") {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    let rel = path.trim_start_matches('/');
    let rel = if rel.is_empty() { "index.html" } else { rel };

    let mut candidates = Vec::new();
    if let Some(root) = state.dirs.first() {
        candidates.push(root.join(rel));
    }
    let basename = rel.rsplit('/').next().unwrap_or(rel);
    for dir in state.dirs.iter().skip(1) {
        candidates.push(dir.join(basename));
    }

    for candidate in &candidates {
        if let Ok(bytes) = tokio::fs::read(candidate).await {
            debug!(path = %candidate.display(), "serving static file");
            return (
                [(header::CONTENT_TYPE, content_type(candidate))],
                bytes,
            )
                .into_response();
        }
    }

    (StatusCode::NOT_FOUND, "File not found").into_response()
}

fn content_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "html" => "text/html",
        "js" => "text/javascript",
        "css" => "text/css",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}
