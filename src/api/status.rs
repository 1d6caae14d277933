use crate::celebration::CelebrationCoordinator;
use crate::hass::{ConnectionStatus, HassClient};
use crate::selector::TeamSelector;
use crate::state::StateEngine;
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Shared state for the status endpoint
pub struct StatusAppState {
    pub hass: HassClient,
    pub engine: Arc<StateEngine>,
    pub selector: Arc<TeamSelector>,
    pub coordinator: Arc<CelebrationCoordinator>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub connection: ConnectionStatus,
    pub active_entity: String,
    pub helper_entity: String,
    pub entity_count: usize,
    pub celebration: CelebrationStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct CelebrationStatus {
    pub cooldown_active: bool,
}

/// Create status router
pub fn create_status_router(state: Arc<StatusAppState>) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .with_state(state)
}

/// GET /api/status - connection and cache health for the HUD and for
/// poking at the wall over curl.
async fn get_status(State(state): State<Arc<StatusAppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connection: state.hass.status(),
        active_entity: state.selector.active(),
        helper_entity: state.selector.helper_entity().to_string(),
        entity_count: state.engine.entity_count(),
        celebration: CelebrationStatus {
            cooldown_active: state.coordinator.cooldown_active().await,
        },
        timestamp: Utc::now(),
    })
}
