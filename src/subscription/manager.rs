use crate::celebration::CelebrationTrigger;
use crate::hass::{ConnectionStatus, HassClient};
use crate::panels::ScoreboardView;
use crate::selector::TeamSelector;
use crate::state::StateUpdate;
use crate::subscription::protocol::{
    CelebrationMessage, ClientMessage, ConfigMessage, ErrorMessage, PanelUpdateMessage,
    StateUpdateMessage, StatusMessage,
};
use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

/// Manages a single kiosk WebSocket connection.
///
/// Raw state updates are narrowed by the client's entity subscriptions;
/// panel, status, and celebration pushes always go through.
pub struct ConnectionManager {
    hass: HassClient,
    selector: Arc<TeamSelector>,
    /// Set of entity IDs this connection is subscribed to
    subscriptions: HashSet<String>,
}

impl ConnectionManager {
    pub fn new(hass: HassClient, selector: Arc<TeamSelector>) -> Self {
        Self {
            hass,
            selector,
            subscriptions: HashSet::new(),
        }
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(
        mut self,
        mut socket: WebSocket,
        greeting: ConfigMessage,
        mut state_rx: broadcast::Receiver<StateUpdate>,
        mut view_rx: watch::Receiver<Option<ScoreboardView>>,
        mut status_rx: watch::Receiver<ConnectionStatus>,
        mut celebration_rx: broadcast::Receiver<CelebrationTrigger>,
    ) {
        info!("Kiosk WebSocket connection established");

        // Celebration pushes reuse the greeting's mask and video settings.
        let mask = greeting.mask.clone();
        let video = greeting.video.clone();

        // Greeting burst: config, current status, current panel view. A
        // freshly loaded kiosk renders without waiting for a change.
        if send_json(&mut socket, &greeting).await.is_err() {
            return;
        }
        let status = StatusMessage::new(status_rx.borrow_and_update().clone());
        if send_json(&mut socket, &status).await.is_err() {
            return;
        }
        let view = view_rx.borrow_and_update().clone();
        if let Some(view) = view {
            if send_json(&mut socket, &PanelUpdateMessage::from(view))
                .await
                .is_err()
            {
                return;
            }
        }

        loop {
            tokio::select! {
                // Handle incoming client messages
                Some(msg) = socket.recv() => {
                    match msg {
                        Ok(Message::Text(text)) => {
                            if let Err(e) = self.handle_client_message(&mut socket, &text).await {
                                error!(error = %e, "Error handling client message");
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!("Kiosk client disconnected");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Ok(_) => {
                            // Ignore binary, pong messages
                        }
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                // Raw entity updates, narrowed by subscriptions
                result = state_rx.recv() => {
                    match result {
                        Ok(update) => {
                            if self.should_forward_update(&update) {
                                let msg = StateUpdateMessage::from(update);
                                if let Err(e) = send_json(&mut socket, &msg).await {
                                    error!(error = %e, "Failed to send state update");
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped = skipped, "Kiosk lagged, skipped state updates");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            error!("State broadcast channel closed");
                            break;
                        }
                    }
                }

                // Scoreboard repaints for the active entity
                changed = view_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let view = view_rx.borrow_and_update().clone();
                    if let Some(view) = view {
                        if let Err(e) = send_json(&mut socket, &PanelUpdateMessage::from(view)).await {
                            error!(error = %e, "Failed to send panel update");
                            break;
                        }
                    }
                }

                // Upstream connection status changes
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let msg = StatusMessage::new(status_rx.borrow_and_update().clone());
                    if let Err(e) = send_json(&mut socket, &msg).await {
                        error!(error = %e, "Failed to send status update");
                        break;
                    }
                }

                result = celebration_rx.recv() => {
                    match result {
                        Ok(trigger) => {
                            let msg = CelebrationMessage::new(trigger, mask.clone(), &video);
                            if let Err(e) = send_json(&mut socket, &msg).await {
                                error!(error = %e, "Failed to send celebration");
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped = skipped, "Kiosk lagged, skipped celebrations");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            break;
                        }
                    }
                }

                else => {
                    break;
                }
            }
        }

        info!("Kiosk WebSocket connection closed");
    }

    /// Handle client message (subscribe/unsubscribe/select_team)
    async fn handle_client_message(
        &mut self,
        socket: &mut WebSocket,
        text: &str,
    ) -> anyhow::Result<()> {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                let reply = ErrorMessage::new(format!("unrecognized message: {e}"));
                send_json(socket, &reply).await?;
                return Ok(());
            }
        };

        match msg {
            ClientMessage::Subscribe { entity_id } => {
                info!(entity_id = %entity_id, "Kiosk subscribed to entity");
                self.subscriptions.insert(entity_id);
            }
            ClientMessage::Unsubscribe { entity_id } => {
                info!(entity_id = %entity_id, "Kiosk unsubscribed from entity");
                self.subscriptions.remove(&entity_id);
            }
            ClientMessage::SelectTeam { entity_id } => {
                info!(entity_id = %entity_id, "Kiosk requested team change");
                if let Err(e) = self.selector.select_team(&self.hass, &entity_id).await {
                    warn!(entity_id = %entity_id, error = %e, "Team change failed");
                    let reply = ErrorMessage::new(format!("team change failed: {e}"));
                    send_json(socket, &reply).await?;
                }
            }
        }

        Ok(())
    }

    /// Check if update should be forwarded to this connection
    fn should_forward_update(&self, update: &StateUpdate) -> bool {
        // If no subscriptions, forward all updates
        if self.subscriptions.is_empty() {
            return true;
        }

        // Otherwise, only forward if subscribed to this entity
        self.subscriptions.contains(&update.entity_id)
    }
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, msg: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string(msg)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}
