use crate::celebration::{CelebrationCoordinator, CelebrationRequest};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Shared state for celebration endpoints
pub struct CelebrationAppState {
    pub coordinator: Arc<CelebrationCoordinator>,
}

/// Create celebration router
pub fn create_celebration_router(state: Arc<CelebrationAppState>) -> Router {
    Router::new()
        .route(
            "/api/trigger-celebration",
            post(trigger_celebration).fallback(method_not_allowed),
        )
        .route("/celebration-trigger.json", get(poll_trigger))
        .with_state(state)
}

/// POST /api/trigger-celebration - store a trigger for the watcher.
///
/// An empty body means "all defaults"; otherwise the body may override
/// videoFile, autoHide, and duration.
async fn trigger_celebration(
    State(state): State<Arc<CelebrationAppState>>,
    body: String,
) -> Response {
    let raw = if body.trim().is_empty() { "{}" } else { &body };
    let request: CelebrationRequest = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": e.to_string()})),
            )
                .into_response();
        }
    };

    match state.coordinator.trigger(request).await {
        Ok(payload) => Json(json!({
            "success": true,
            "message": format!("Celebration triggered for {}", payload.video_file),
            "data": payload,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "could not store celebration trigger");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// GET /celebration-trigger.json - one-shot poll used by external
/// clients; returns the pending trigger once, then `{}`.
async fn poll_trigger(State(state): State<Arc<CelebrationAppState>>) -> Response {
    match state.coordinator.take_pending().await {
        Some(trigger) => Json(trigger).into_response(),
        None => Json(json!({})).into_response(),
    }
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method not allowed"})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(dir: &std::path::Path) -> Arc<CelebrationAppState> {
        Arc::new(CelebrationAppState {
            coordinator: Arc::new(CelebrationCoordinator::new(
                dir,
                "assets/videos/ric-flair-celebration.mp4".to_string(),
            )),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_trigger_with_empty_body_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let response = trigger_celebration(State(state), String::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(
            json["message"],
            "Celebration triggered for assets/videos/ric-flair-celebration.mp4"
        );
        assert_eq!(json["data"]["autoHide"], true);
        assert_eq!(json["data"]["duration"], 10_000);
        assert!(dir.path().join("celebration-trigger.json").exists());
    }

    #[tokio::test]
    async fn test_trigger_rejects_malformed_body() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let response = trigger_celebration(State(state), "not json".to_string()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_poll_serves_the_trigger_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        trigger_celebration(
            State(state.clone()),
            r#"{"videoFile":"assets/videos/goal.mp4"}"#.to_string(),
        )
        .await;

        let first = body_json(poll_trigger(State(state.clone())).await).await;
        assert_eq!(first["videoFile"], "assets/videos/goal.mp4");

        let second = body_json(poll_trigger(State(state)).await).await;
        assert_eq!(second, json!({}));
    }

    #[tokio::test]
    async fn test_non_post_trigger_is_rejected() {
        let response = method_not_allowed().await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Method not allowed");
    }
}
