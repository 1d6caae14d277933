use crate::celebration::CelebrationCoordinator;
use crate::config::WallConfig;
use crate::hass::HassClient;
use crate::panels::ScoreboardView;
use crate::selector::TeamSelector;
use crate::state::StateEngine;
use crate::subscription::{ConfigMessage, ConnectionManager};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared application state for the kiosk WebSocket handler
#[derive(Clone)]
pub struct WsAppState {
    pub config: WallConfig,
    pub engine: Arc<StateEngine>,
    pub selector: Arc<TeamSelector>,
    pub hass: HassClient,
    pub views: watch::Receiver<Option<ScoreboardView>>,
    pub coordinator: Arc<CelebrationCoordinator>,
}

/// GET /api/ws - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsAppState>>) -> Response {
    info!("Kiosk WebSocket upgrade request received");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Create kiosk WebSocket router
pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<WsAppState>) {
    let greeting = ConfigMessage::new(&state.config, state.selector.active());

    let manager = ConnectionManager::new(state.hass.clone(), state.selector.clone());
    manager
        .handle(
            socket,
            greeting,
            state.engine.subscribe(),
            state.views.clone(),
            state.hass.watch_status(),
            state.coordinator.subscribe(),
        )
        .await;
}
