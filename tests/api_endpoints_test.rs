// Integration tests for the assembled HTTP surface: the same router
// merge the server binary builds, driven with tower::oneshot.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use scorewall::api::{
    create_celebration_router, create_env_router, create_static_router, create_status_router,
    create_team_router, create_ws_router, CelebrationAppState, EnvAppState, StaticAppState,
    StatusAppState, TeamAppState, WsAppState,
};
use scorewall::celebration::CelebrationCoordinator;
use scorewall::config::WallConfig;
use scorewall::hass::HassClient;
use scorewall::panels::ScoreboardView;
use scorewall::selector::TeamSelector;
use scorewall::state::StateEngine;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;
use tower_http::cors::{Any, CorsLayer};

struct TestWall {
    app: Router,
    coordinator: Arc<CelebrationCoordinator>,
    data_dir: tempfile::TempDir,
    _static_root: tempfile::TempDir,
    _view_tx: watch::Sender<Option<ScoreboardView>>,
}

/// Mirror the binary's assembly: six routers merged, CORS on top, a
/// disabled Home Assistant client, and temp dirs for files.
fn build_wall() -> TestWall {
    let data_dir = tempfile::tempdir().unwrap();
    let static_root = tempfile::tempdir().unwrap();
    std::fs::write(static_root.path().join("index.html"), "<html>wall</html>").unwrap();
    std::fs::create_dir(static_root.path().join("css")).unwrap();
    std::fs::write(static_root.path().join("css/style.css"), "body{}").unwrap();

    let mut config = WallConfig::default();
    config.server.static_dirs = vec![
        static_root.path().to_str().unwrap().to_string(),
        static_root.path().join("css").to_str().unwrap().to_string(),
    ];
    config.server.data_dir = data_dir.path().to_str().unwrap().to_string();

    let engine = Arc::new(StateEngine::new());
    let selector = Arc::new(TeamSelector::new(
        config.home_assistant.game_score_entity.clone(),
        config.home_assistant.team_helper_entity.clone(),
    ));
    // Empty URL and token keep the client task from dialing out.
    let mut hass_config = config.home_assistant.clone();
    hass_config.url.clear();
    hass_config.token.clear();
    let (hass, _task) = HassClient::spawn(&hass_config, engine.clone(), selector.watch());
    let coordinator = Arc::new(CelebrationCoordinator::new(
        data_dir.path(),
        config.video.default_celebration.clone(),
    ));
    let (view_tx, view_rx) = watch::channel(None);
    let http = reqwest::Client::new();

    let app = Router::new()
        .merge(create_env_router(Arc::new(EnvAppState {
            config: config.clone(),
        })))
        .merge(create_team_router(Arc::new(TeamAppState::new(
            &config.home_assistant,
            http,
        ))))
        .merge(create_celebration_router(Arc::new(CelebrationAppState {
            coordinator: coordinator.clone(),
        })))
        .merge(create_status_router(Arc::new(StatusAppState {
            hass: hass.clone(),
            engine: engine.clone(),
            selector: selector.clone(),
            coordinator: coordinator.clone(),
        })))
        .merge(create_ws_router(Arc::new(WsAppState {
            config: config.clone(),
            engine,
            selector,
            hass,
            views: view_rx,
            coordinator: coordinator.clone(),
        })))
        .merge(create_static_router(Arc::new(StaticAppState::new(
            &config.server.static_dirs,
        ))))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    TestWall {
        app,
        coordinator,
        data_dir,
        _static_root: static_root,
        _view_tx: view_tx,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_env_reports_resolved_settings() {
    let wall = build_wall();
    let response = wall.app.oneshot(get("/api/env")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let env = json_body(response).await;
    assert_eq!(
        env["HOME_ASSISTANT_URL"],
        "ws://homeassistant.local:8123/api/websocket"
    );
    assert_eq!(env["GAME_SCORE_ENTITY"], "sensor.atlanta_falcons");
    assert_eq!(env["PANEL_WIDTH"], "27");
    assert_eq!(env["PANEL_GAP"], "2");
}

#[tokio::test]
async fn test_status_reports_disconnected_client() {
    let wall = build_wall();
    let response = wall.app.oneshot(get("/api/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = json_body(response).await;
    assert_eq!(status["connection"]["state"], "disconnected");
    assert_eq!(status["active_entity"], "sensor.atlanta_falcons");
    assert_eq!(status["entity_count"], 0);
    assert_eq!(status["celebration"]["cooldown_active"], false);
}

#[tokio::test]
async fn test_celebration_trigger_is_consumed_once() {
    let wall = build_wall();

    let response = wall
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/trigger-celebration")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert!(wall
        .data_dir
        .path()
        .join("celebration-trigger.json")
        .exists());

    // First poll hands the trigger out and deletes the file.
    let response = wall
        .app
        .clone()
        .oneshot(get("/celebration-trigger.json"))
        .await
        .unwrap();
    let trigger = json_body(response).await;
    assert_eq!(trigger["type"], "celebration_trigger");
    assert_eq!(
        trigger["videoFile"],
        "assets/videos/ric-flair-celebration.mp4"
    );
    assert_eq!(trigger["autoHide"], true);
    assert_eq!(trigger["duration"], 10000);
    assert!(!wall
        .data_dir
        .path()
        .join("celebration-trigger.json")
        .exists());

    // Second poll finds nothing.
    let response = wall
        .app
        .oneshot(get("/celebration-trigger.json"))
        .await
        .unwrap();
    assert_eq!(json_body(response).await, serde_json::json!({}));
}

#[tokio::test]
async fn test_celebration_rejects_get() {
    let wall = build_wall();
    let response = wall
        .app
        .oneshot(get("/api/trigger-celebration"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        json_body(response).await["error"],
        "Method not allowed"
    );
    // The rejected request must not leave a trigger behind.
    assert!(wall.coordinator.take_pending().await.is_none());
}

#[tokio::test]
async fn test_static_fallback_serves_unmatched_paths() {
    let wall = build_wall();

    let response = wall.app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");

    // A bare stylesheet name is found by basename in the css dir.
    let response = wall.app.clone().oneshot(get("/style.css")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");

    let response = wall.app.clone().oneshot(get("/missing.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Unknown /api paths fall through to the same 404.
    let response = wall.app.oneshot(get("/api/nonexistent")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_traversal_paths_are_forbidden() {
    let wall = build_wall();
    let response = wall.app.oneshot(get("/../Cargo.toml")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cors_headers_on_api_responses() {
    let wall = build_wall();
    let response = wall
        .app
        .oneshot(
            Request::builder()
                .uri("/api/env")
                .header(header::ORIGIN, "http://kiosk.local")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
