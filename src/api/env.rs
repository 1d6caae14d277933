use crate::config::WallConfig;
use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;

/// Shared state for the environment passthrough endpoint
pub struct EnvAppState {
    pub config: WallConfig,
}

/// Environment values the kiosk page reads at load time. Keys keep the
/// environment-variable spelling the page expects.
#[derive(Serialize)]
pub struct EnvResponse {
    #[serde(rename = "HOME_ASSISTANT_URL")]
    pub home_assistant_url: String,
    #[serde(rename = "HOME_ASSISTANT_TOKEN")]
    pub home_assistant_token: String,
    #[serde(rename = "GAME_SCORE_ENTITY")]
    pub game_score_entity: String,
    #[serde(rename = "PANEL_WIDTH")]
    pub panel_width: String,
    #[serde(rename = "PANEL_GAP")]
    pub panel_gap: String,
}

/// Create environment passthrough router
pub fn create_env_router(state: Arc<EnvAppState>) -> Router {
    Router::new()
        .route("/api/env", get(get_env))
        .with_state(state)
}

/// GET /api/env - resolved settings for the kiosk page.
///
/// Unauthenticated, like the rest of the local surface; the access token
/// is visible to any caller that can reach the server.
async fn get_env(State(state): State<Arc<EnvAppState>>) -> Json<EnvResponse> {
    let config = &state.config;
    Json(EnvResponse {
        home_assistant_url: config.home_assistant.url.clone(),
        home_assistant_token: config.home_assistant.token.clone(),
        game_score_entity: config.home_assistant.game_score_entity.clone(),
        panel_width: config.panels.width_pct.to_string(),
        panel_gap: config.panels.gap_pct.to_string(),
    })
}
