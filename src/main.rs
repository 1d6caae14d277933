use anyhow::{Context, Result};
use scorewall::api::{
    create_celebration_router, create_env_router, create_static_router, create_status_router,
    create_team_router, create_ws_router, CelebrationAppState, EnvAppState, StaticAppState,
    StatusAppState, TeamAppState, WsAppState,
};
use scorewall::celebration::CelebrationCoordinator;
use scorewall::config::{load_config, WallConfig};
use scorewall::hass::HassClient;
use scorewall::panels::broadcaster;
use scorewall::selector::TeamSelector;
use scorewall::state::StateEngine;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scorewall=info".into()),
        )
        .init();

    info!("Scorewall starting...");

    let config = resolve_config()?;
    for problem in config.validate() {
        warn!(problem = %problem, "Configuration problem");
    }
    if config.home_assistant.token.is_empty() {
        warn!("No Home Assistant token configured; the upstream connection will not authenticate");
    } else {
        // Kept for kiosk compatibility; anyone who can reach the server
        // can read the token.
        warn!("/api/env exposes the Home Assistant access token to all clients");
    }

    // State engine and entity cache
    let engine = Arc::new(StateEngine::new());

    // Team selection, seeded from config
    let selector = Arc::new(TeamSelector::new(
        config.home_assistant.game_score_entity.clone(),
        config.home_assistant.team_helper_entity.clone(),
    ));
    let _poller = selector.spawn_poller(Arc::clone(&engine));
    info!(
        active_entity = %selector.active(),
        helper_entity = %selector.helper_entity(),
        "Team selector started"
    );

    // Home Assistant client
    let (hass, _hass_task) =
        HassClient::spawn(&config.home_assistant, Arc::clone(&engine), selector.watch());
    info!(url = %config.home_assistant.url, "Home Assistant client started");

    // Celebration trigger watcher
    let coordinator = Arc::new(CelebrationCoordinator::new(
        Path::new(&config.server.data_dir),
        config.video.default_celebration.clone(),
    ));
    let _watcher = coordinator.spawn_watcher();

    // Panel view broadcaster
    let http = reqwest::Client::new();
    let (view_tx, view_rx) = watch::channel(None);
    let _broadcaster = broadcaster::spawn(
        Arc::clone(&engine),
        hass.clone(),
        selector.watch(),
        view_tx,
        http.clone(),
    );

    // Assemble the HTTP surface, one router per concern
    let env_state = Arc::new(EnvAppState {
        config: config.clone(),
    });
    let team_state = Arc::new(TeamAppState::new(&config.home_assistant, http.clone()));
    let celebration_state = Arc::new(CelebrationAppState {
        coordinator: Arc::clone(&coordinator),
    });
    let status_state = Arc::new(StatusAppState {
        hass: hass.clone(),
        engine: Arc::clone(&engine),
        selector: Arc::clone(&selector),
        coordinator: Arc::clone(&coordinator),
    });
    let ws_state = Arc::new(WsAppState {
        config: config.clone(),
        engine: Arc::clone(&engine),
        selector: Arc::clone(&selector),
        hass: hass.clone(),
        views: view_rx,
        coordinator: Arc::clone(&coordinator),
    });
    let static_state = Arc::new(StaticAppState::new(&config.server.static_dirs));

    let app = axum::Router::new()
        .merge(create_env_router(env_state))
        .merge(create_team_router(team_state))
        .merge(create_celebration_router(celebration_state))
        .merge(create_status_router(status_state))
        .merge(create_ws_router(ws_state))
        .merge(create_static_router(static_state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Wall server listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Wall server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Wall server stopped");

    Ok(())
}

/// Configuration file (SCOREWALL_CONFIG or ./config.toml), then
/// environment overrides on top.
fn resolve_config() -> Result<WallConfig> {
    let path =
        std::env::var("SCOREWALL_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let mut config = if Path::new(&path).exists() {
        info!(path = %path, "Loading configuration file");
        load_config(&path)?
    } else {
        info!("No configuration file found, using defaults");
        WallConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}
