use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::protocol::{ClientMessage, ErrorObject, ServerMessage};
use super::session::{CommandFailure, CommandResult, ConnectionState, Session, SessionEvent};
use crate::config::HomeAssistantConfig;
use crate::state::StateEngine;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pending commands are failed after this long without a result.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Heartbeat cadence while authenticated.
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Reconnect delay grows by this much per consecutive failure.
const RECONNECT_STEP: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Service activity on the watched entity triggers a snapshot refresh
/// after this grace period, letting Home Assistant finish the update.
const TOUCH_REFRESH_DELAY: Duration = Duration::from_millis(500);

/// Connection health as reported to the status endpoint and the kiosk.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub detail: String,
    pub reconnect_attempts: u32,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus {
            state: ConnectionState::Disconnected,
            detail: "not connected".to_string(),
            reconnect_attempts: 0,
        }
    }
}

/// Why a service call issued through [`HassClient`] failed.
#[derive(Debug)]
pub enum ClientError {
    /// No authenticated session right now.
    NotConnected,
    /// The session dropped before a result arrived.
    ConnectionLost,
    /// No result within [`REQUEST_TIMEOUT`].
    Timeout,
    /// Home Assistant refused the command.
    Rejected(ErrorObject),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::NotConnected => write!(f, "not connected to Home Assistant"),
            ClientError::ConnectionLost => {
                write!(f, "connection to Home Assistant lost before a result arrived")
            }
            ClientError::Timeout => write!(f, "Home Assistant did not answer in time"),
            ClientError::Rejected(err) => write!(f, "Home Assistant rejected the command: {}", err),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<CommandFailure> for ClientError {
    fn from(failure: CommandFailure) -> Self {
        match failure {
            CommandFailure::Timeout => ClientError::Timeout,
            CommandFailure::Rejected(err) => ClientError::Rejected(err),
        }
    }
}

enum Command {
    CallService {
        domain: String,
        service: String,
        service_data: Value,
        reply: oneshot::Sender<CommandResult>,
    },
    RefreshStates,
}

/// Cheap-to-clone handle for talking to the connection task.
#[derive(Clone)]
pub struct HassClient {
    cmd_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl HassClient {
    /// Start the connection task. `active_entity` names the entity whose
    /// service activity should trigger delayed snapshot refreshes.
    pub fn spawn(
        config: &HomeAssistantConfig,
        engine: Arc<StateEngine>,
        active_entity: watch::Receiver<String>,
    ) -> (HassClient, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::default());
        let client = HassClient {
            cmd_tx: cmd_tx.clone(),
            status_rx,
        };
        let runner = ClientRunner {
            url: config.url.clone(),
            token: config.token.clone(),
            cmd_rx,
            ctx: SessionContext {
                engine,
                status_tx,
                cmd_tx,
                active_entity,
            },
        };
        let task = tokio::spawn(runner.run());
        (client, task)
    }

    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        service_data: Value,
    ) -> Result<Option<Value>, ClientError> {
        if self.status_rx.borrow().state != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CallService {
                domain: domain.to_string(),
                service: service.to_string(),
                service_data,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ClientError::NotConnected)?;
        match reply_rx.await {
            Ok(outcome) => outcome.map_err(ClientError::from),
            Err(_) => Err(ClientError::ConnectionLost),
        }
    }

    /// Ask for a fresh get_states snapshot. Fire and forget.
    pub fn request_refresh(&self) {
        let _ = self.cmd_tx.try_send(Command::RefreshStates);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status_rx.borrow().state == ConnectionState::Connected
    }
}

/// Shared pieces the session loop needs besides the socket itself.
struct SessionContext {
    engine: Arc<StateEngine>,
    status_tx: watch::Sender<ConnectionStatus>,
    cmd_tx: mpsc::Sender<Command>,
    active_entity: watch::Receiver<String>,
}

impl SessionContext {
    fn set_status(&self, state: ConnectionState, detail: impl Into<String>, attempts: u32) {
        let _ = self.status_tx.send(ConnectionStatus {
            state,
            detail: detail.into(),
            reconnect_attempts: attempts,
        });
    }
}

enum SessionEnd {
    /// Token rejected. Reconnecting would only fail again.
    AuthRejected,
    /// All command handles dropped; the service is shutting down.
    Closed,
    /// Transport failure worth retrying.
    Dropped(String),
}

struct ClientRunner {
    url: String,
    token: String,
    cmd_rx: mpsc::Receiver<Command>,
    ctx: SessionContext,
}

impl ClientRunner {
    async fn run(mut self) {
        if self.url.is_empty() || self.token.is_empty() {
            error!("Home Assistant URL or token not configured; client disabled");
            self.ctx.set_status(
                ConnectionState::Disconnected,
                "Home Assistant URL or token not configured",
                0,
            );
            return;
        }

        let mut session = Session::new(self.token.clone());
        let mut attempts: u32 = 0;
        loop {
            self.ctx
                .set_status(ConnectionState::Connecting, "connecting", attempts);
            info!(url = %self.url, "connecting to Home Assistant");
            match connect_async(self.url.as_str()).await {
                Ok((mut ws, _)) => {
                    // A successful open resets the backoff counter.
                    attempts = 0;
                    let end =
                        drive_session(&mut ws, &mut session, &mut self.cmd_rx, &self.ctx).await;
                    session.on_disconnect();
                    match end {
                        SessionEnd::AuthRejected => {
                            error!("Home Assistant rejected the access token; not retrying");
                            self.ctx.set_status(
                                ConnectionState::Disconnected,
                                "authentication failed",
                                attempts,
                            );
                            return;
                        }
                        SessionEnd::Closed => {
                            info!("command channel closed; stopping Home Assistant client");
                            return;
                        }
                        SessionEnd::Dropped(reason) => {
                            warn!(reason = %reason, "lost connection to Home Assistant");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "could not reach Home Assistant");
                }
            }

            attempts += 1;
            if attempts > MAX_RECONNECT_ATTEMPTS {
                error!(
                    max = MAX_RECONNECT_ATTEMPTS,
                    "max reconnect attempts reached; giving up"
                );
                self.ctx.set_status(
                    ConnectionState::Disconnected,
                    "max reconnect attempts reached",
                    MAX_RECONNECT_ATTEMPTS,
                );
                return;
            }
            let delay = RECONNECT_STEP * attempts;
            info!(
                attempt = attempts,
                delay_secs = delay.as_secs(),
                "reconnecting after delay"
            );
            self.ctx.set_status(
                ConnectionState::Disconnected,
                format!(
                    "reconnecting (attempt {}/{})",
                    attempts, MAX_RECONNECT_ATTEMPTS
                ),
                attempts,
            );
            tokio::time::sleep(delay).await;
        }
    }
}

async fn send_message(ws: &mut WsStream, msg: &ClientMessage) -> Result<()> {
    let text = serde_json::to_string(msg)?;
    ws.send(Message::Text(text)).await?;
    Ok(())
}

async fn drive_session(
    ws: &mut WsStream,
    session: &mut Session,
    cmd_rx: &mut mpsc::Receiver<Command>,
    ctx: &SessionContext,
) -> SessionEnd {
    let auth = session.on_open();
    if let Err(e) = send_message(ws, &auth).await {
        return SessionEnd::Dropped(format!("failed to send auth: {}", e));
    }
    ctx.set_status(ConnectionState::Authenticating, "authenticating", 0);

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sweep = tokio::time::interval(Duration::from_secs(1));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            incoming = ws.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) => {
                        return SessionEnd::Dropped("server closed the connection".to_string());
                    }
                    // Transport-level control frames; tungstenite answers
                    // pings on its own.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return SessionEnd::Dropped(format!("websocket error: {}", e));
                    }
                    None => {
                        return SessionEnd::Dropped("connection closed".to_string());
                    }
                };
                let msg: ServerMessage = match serde_json::from_str(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "undecodable message from Home Assistant");
                        continue;
                    }
                };
                let turn = session.handle_message(msg);
                for out in &turn.outbound {
                    if let Err(e) = send_message(ws, out).await {
                        return SessionEnd::Dropped(format!("send failed: {}", e));
                    }
                }
                for event in turn.events {
                    match event {
                        SessionEvent::Authenticated { .. } => {
                            ctx.set_status(
                                ConnectionState::Connected,
                                "connected to Home Assistant",
                                0,
                            );
                        }
                        SessionEvent::AuthFailed { .. } => {
                            return SessionEnd::AuthRejected;
                        }
                        SessionEvent::Snapshot(states) => {
                            let total = states.len();
                            let changed = ctx.engine.apply_snapshot(states);
                            debug!(total, changed, "applied entity snapshot");
                        }
                        SessionEvent::StateChanged { entity_id, new_state } => {
                            ctx.engine.apply_state_changed(&entity_id, new_state);
                        }
                        SessionEvent::EntityTouched { entity_id } => {
                            if entity_id == *ctx.active_entity.borrow() {
                                debug!(
                                    entity_id = %entity_id,
                                    "service activity on watched entity; scheduling refresh"
                                );
                                let tx = ctx.cmd_tx.clone();
                                tokio::spawn(async move {
                                    tokio::time::sleep(TOUCH_REFRESH_DELAY).await;
                                    let _ = tx.try_send(Command::RefreshStates);
                                });
                            }
                        }
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::CallService { domain, service, service_data, reply }) => {
                        let msg = session.call_service(domain, service, service_data, reply);
                        if let Err(e) = send_message(ws, &msg).await {
                            return SessionEnd::Dropped(format!("send failed: {}", e));
                        }
                    }
                    Some(Command::RefreshStates) => {
                        if session.is_connected() {
                            let msg = session.request_states();
                            if let Err(e) = send_message(ws, &msg).await {
                                return SessionEnd::Dropped(format!("send failed: {}", e));
                            }
                        }
                    }
                    None => return SessionEnd::Closed,
                }
            }
            _ = ping.tick() => {
                if session.is_connected() {
                    let msg = session.ping();
                    if let Err(e) = send_message(ws, &msg).await {
                        return SessionEnd::Dropped(format!("heartbeat failed: {}", e));
                    }
                }
            }
            _ = sweep.tick() => {
                session.expire_pending(REQUEST_TIMEOUT);
            }
        }
    }
}
