// End-to-end tests for the kiosk WebSocket: a real listener, a real
// tungstenite client, and the channels the server binary wires up.

use futures::{SinkExt, StreamExt};
use scorewall::api::{create_ws_router, WsAppState};
use scorewall::celebration::{CelebrationCoordinator, CelebrationRequest};
use scorewall::config::WallConfig;
use scorewall::hass::HassClient;
use scorewall::panels::{build_view, ScoreboardView};
use scorewall::selector::TeamSelector;
use scorewall::state::{EntityState, StateEngine};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsHarness {
    addr: SocketAddr,
    engine: Arc<StateEngine>,
    coordinator: Arc<CelebrationCoordinator>,
    view_tx: watch::Sender<Option<ScoreboardView>>,
    _data_dir: tempfile::TempDir,
}

async fn spawn_wall() -> WsHarness {
    let data_dir = tempfile::tempdir().unwrap();
    let config = WallConfig::default();

    let engine = Arc::new(StateEngine::new());
    let selector = Arc::new(TeamSelector::new(
        config.home_assistant.game_score_entity.clone(),
        config.home_assistant.team_helper_entity.clone(),
    ));
    let mut hass_config = config.home_assistant.clone();
    hass_config.url.clear();
    hass_config.token.clear();
    let (hass, _task) = HassClient::spawn(&hass_config, engine.clone(), selector.watch());
    let coordinator = Arc::new(CelebrationCoordinator::new(
        data_dir.path(),
        config.video.default_celebration.clone(),
    ));
    let (view_tx, view_rx) = watch::channel(None);

    let app = create_ws_router(Arc::new(WsAppState {
        config,
        engine: engine.clone(),
        selector,
        hass,
        views: view_rx,
        coordinator: coordinator.clone(),
    }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    WsHarness {
        addr,
        engine,
        coordinator,
        view_tx,
        _data_dir: data_dir,
    }
}

async fn connect(addr: SocketAddr) -> ClientSocket {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws"))
        .await
        .unwrap();
    socket
}

async fn next_json(socket: &mut ClientSocket) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("no message within 2s")
            .expect("socket closed")
            .unwrap();
        match msg {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

/// Connect and consume the config and status greeting frames.
async fn greeted(addr: SocketAddr) -> ClientSocket {
    let mut socket = connect(addr).await;
    assert_eq!(next_json(&mut socket).await["type"], "config");
    assert_eq!(next_json(&mut socket).await["type"], "status");
    socket
}

fn game_entity(entity_id: &str) -> EntityState {
    serde_json::from_value(json!({
        "entity_id": entity_id,
        "state": "IN",
        "attributes": {
            "sport": "football",
            "league": "NFL",
            "team_homeaway": "home",
            "team_abbr": "ATL",
            "opponent_abbr": "NO",
            "team_score": 21,
            "opponent_score": 17,
            "quarter": "3",
            "clock": "07:12",
        },
    }))
    .unwrap()
}

#[tokio::test]
async fn test_greeting_sends_config_then_status() {
    let wall = spawn_wall().await;
    let mut socket = connect(wall.addr).await;

    let config = next_json(&mut socket).await;
    assert_eq!(config["type"], "config");
    assert_eq!(config["active_entity"], "sensor.atlanta_falcons");
    assert_eq!(config["regions"].as_array().unwrap().len(), 3);
    assert_eq!(config["regions"][0]["start"], json!(7.5));
    assert!(config["mask"]
        .as_str()
        .unwrap()
        .starts_with("linear-gradient(to right"));
    assert_eq!(config["teams"].as_array().unwrap().len(), 4);
    assert_eq!(config["video"]["volume"], json!(0.5));

    let status = next_json(&mut socket).await;
    assert_eq!(status["type"], "status");
    assert_eq!(status["connection"]["state"], "disconnected");
}

#[tokio::test]
async fn test_existing_view_included_in_greeting() {
    let wall = spawn_wall().await;
    wall.view_tx
        .send_replace(Some(build_view(&game_entity("sensor.atlanta_falcons"), None)));

    // A kiosk connecting mid-game paints without waiting for the next
    // score change.
    let mut socket = greeted(wall.addr).await;
    let update = next_json(&mut socket).await;
    assert_eq!(update["type"], "panel_update");
    assert_eq!(update["view"]["entity_id"], "sensor.atlanta_falcons");
}

#[tokio::test]
async fn test_view_updates_reach_connected_kiosks() {
    let wall = spawn_wall().await;
    let mut socket = greeted(wall.addr).await;

    wall.view_tx
        .send_replace(Some(build_view(&game_entity("sensor.atlanta_falcons"), None)));

    let update = next_json(&mut socket).await;
    assert_eq!(update["type"], "panel_update");
    let view = &update["view"];
    assert_eq!(view["status"], "IN");
    assert_eq!(view["sport"], "football");
    assert_eq!(view["center"]["layout"], "football");
    // NFL home team renders on the right.
    assert_eq!(view["right"]["tracked"], true);
    assert_eq!(view["right"]["abbr"], "ATL");
    assert_eq!(view["right"]["score"], "21");
    assert_eq!(view["left"]["abbr"], "NO");
}

#[tokio::test]
async fn test_state_updates_forwarded_by_default() {
    let wall = spawn_wall().await;
    let mut socket = greeted(wall.addr).await;

    wall.engine
        .apply_state_changed("sensor.anything", Some(game_entity("sensor.anything")));

    let update = next_json(&mut socket).await;
    assert_eq!(update["type"], "state_update");
    assert_eq!(update["entity_id"], "sensor.anything");
    assert_eq!(update["state"], "IN");
}

#[tokio::test]
async fn test_subscribe_narrows_state_updates() {
    let wall = spawn_wall().await;
    let mut socket = greeted(wall.addr).await;

    socket
        .send(WsMessage::Text(
            r#"{"type":"subscribe","entity_id":"sensor.boston_celtics"}"#.to_string(),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    wall.engine
        .apply_state_changed("sensor.other", Some(game_entity("sensor.other")));
    wall.engine.apply_state_changed(
        "sensor.boston_celtics",
        Some(game_entity("sensor.boston_celtics")),
    );

    // The unsubscribed entity is dropped; the next frame is the
    // subscribed one.
    let update = next_json(&mut socket).await;
    assert_eq!(update["type"], "state_update");
    assert_eq!(update["entity_id"], "sensor.boston_celtics");
}

#[tokio::test]
async fn test_select_team_without_ha_reports_error() {
    let wall = spawn_wall().await;
    let mut socket = greeted(wall.addr).await;

    socket
        .send(WsMessage::Text(
            r#"{"type":"select_team","entity_id":"sensor.boston_celtics"}"#.to_string(),
        ))
        .await
        .unwrap();

    // The client is not connected to Home Assistant, so the write-back
    // fails and the kiosk is told.
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert!(reply["error"]
        .as_str()
        .unwrap()
        .contains("not connected to Home Assistant"));
}

#[tokio::test]
async fn test_malformed_client_message_gets_error_frame() {
    let wall = spawn_wall().await;
    let mut socket = greeted(wall.addr).await;

    socket
        .send(WsMessage::Text("not json".to_string()))
        .await
        .unwrap();

    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
}

#[tokio::test]
async fn test_celebration_pushed_to_kiosks() {
    let wall = spawn_wall().await;
    let mut socket = greeted(wall.addr).await;

    wall.coordinator
        .trigger(CelebrationRequest::default())
        .await
        .unwrap();
    assert!(wall.coordinator.poll_and_fire().await.is_some());

    let msg = next_json(&mut socket).await;
    assert_eq!(msg["type"], "celebration");
    assert_eq!(
        msg["trigger"]["videoFile"],
        "assets/videos/ric-flair-celebration.mp4"
    );
    assert_eq!(msg["trigger"]["autoHide"], true);
    assert_eq!(msg["volume"], json!(0.8));
    assert_eq!(msg["loop_playback"], false);
    assert!(msg["mask"]
        .as_str()
        .unwrap()
        .starts_with("linear-gradient(to right"));
}
