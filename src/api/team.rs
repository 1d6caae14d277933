use crate::config::HomeAssistantConfig;
use crate::selector::format_entity_name;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state for the team selection proxy
pub struct TeamAppState {
    pub http: reqwest::Client,
    pub ha_base: String,
    pub token: String,
    pub helper_entity: String,
}

impl TeamAppState {
    pub fn new(config: &HomeAssistantConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            ha_base: ha_rest_base_url(&config.url),
            token: config.token.clone(),
            helper_entity: config.team_helper_entity.clone(),
        }
    }
}

/// Create team selection router
pub fn create_team_router(state: Arc<TeamAppState>) -> Router {
    Router::new()
        .route("/api/set-team", post(set_team))
        .route("/api/current-team", get(current_team))
        .with_state(state)
}

/// Derive the Home Assistant REST base URL from the websocket URL:
/// `ws`/`wss` become `http`/`https`, the `/api/websocket` path is
/// dropped, and portless URLs get the scheme default (8123 for http,
/// 443 for https).
pub fn ha_rest_base_url(ws_url: &str) -> String {
    let (scheme, rest) = match ws_url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("ws", ws_url),
    };
    let secure = matches!(scheme, "wss" | "https");
    let authority = rest.split('/').next().unwrap_or(rest);
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            (host, port.to_string())
        }
        _ => {
            let default = if secure { "443" } else { "8123" };
            (authority, default.to_string())
        }
    };
    let http_scheme = if secure { "https" } else { "http" };
    format!("{http_scheme}://{host}:{port}")
}

/// POST /api/set-team - persist the team selection in Home Assistant.
///
/// Proxies an `input_text.set_value` service call on the helper entity,
/// so the selection survives restarts and other clients pick it up via
/// the normal helper poll.
async fn set_team(State(state): State<Arc<TeamAppState>>, body: String) -> Response {
    let requested: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": e.to_string()})),
            )
                .into_response();
        }
    };
    let entity_id = requested
        .get("entity_id")
        .and_then(Value::as_str)
        .unwrap_or("");
    if entity_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "entity_id is required"})),
        )
            .into_response();
    }

    let url = format!("{}/api/services/input_text/set_value", state.ha_base);
    let payload = json!({
        "entity_id": state.helper_entity,
        "value": entity_id,
    });
    let result = state
        .http
        .post(&url)
        .bearer_auth(&state.token)
        .json(&payload)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            let ha_result = response.json::<Value>().await.unwrap_or(Value::Null);
            info!(entity_id = %entity_id, "team selection written to Home Assistant");
            Json(json!({
                "success": true,
                "message": "Team updated successfully in Home Assistant",
                "team": requested,
                "ha_result": ha_result,
            }))
            .into_response()
        }
        Ok(response) => {
            warn!(status = %response.status(), "Home Assistant rejected set-team");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "success": false,
                    "error": format!("Home Assistant API error: {}", response.status()),
                })),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "set-team proxy request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"success": false, "error": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// GET /api/current-team - read the helper entity back from Home
/// Assistant. The helper's state string is the selected entity id.
async fn current_team(State(state): State<Arc<TeamAppState>>) -> Response {
    let url = format!("{}/api/states/{}", state.ha_base, state.helper_entity);
    let result = state.http.get(&url).bearer_auth(&state.token).send().await;

    let response = match result {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            warn!(status = %response.status(), "Home Assistant rejected current-team");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "success": false,
                    "error": format!("Home Assistant API error: {}", response.status()),
                })),
            )
                .into_response();
        }
        Err(e) => {
            warn!(error = %e, "current-team proxy request failed");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"success": false, "error": e.to_string()})),
            )
                .into_response();
        }
    };

    let helper: Value = match response.json().await {
        Ok(value) => value,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"success": false, "error": e.to_string()})),
            )
                .into_response();
        }
    };
    let selected = helper.get("state").and_then(Value::as_str).unwrap_or("");
    if selected.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No team set"})),
        )
            .into_response();
    }

    Json(json!({
        "entity_id": selected,
        "name": format_entity_name(selected),
        "timestamp": helper.get("last_changed").cloned().unwrap_or(Value::Null),
    }))
    .into_response()
}
