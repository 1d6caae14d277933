use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::protocol::{ClientMessage, ErrorObject, HassEvent, ServerMessage, StateChangedData};
use crate::state::EntityState;

/// Lifecycle of the Home Assistant connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Connected => "connected",
        };
        write!(f, "{}", label)
    }
}

/// Why a command never produced a successful result.
#[derive(Debug)]
pub enum CommandFailure {
    /// No result arrived within the request timeout window.
    Timeout,
    /// Home Assistant answered with `success: false`.
    Rejected(ErrorObject),
}

pub type CommandResult = Result<Option<Value>, CommandFailure>;

enum PendingKind {
    /// Caller-issued command awaiting its reply channel.
    Command(oneshot::Sender<CommandResult>),
    /// Session-issued get_states whose result becomes a snapshot event.
    Snapshot,
    /// Session-issued subscribe_events; only logged on completion.
    Subscription,
}

struct PendingRequest {
    kind: PendingKind,
    issued_at: Instant,
}

/// Side effects the connection driver must act on after a server message.
#[derive(Debug)]
pub enum SessionEvent {
    /// Auth handshake completed; the connection is usable.
    Authenticated { ha_version: Option<String> },
    /// The token was rejected. Terminal: the driver must not reconnect.
    AuthFailed { message: String },
    /// Full entity snapshot from a completed get_states.
    Snapshot(Vec<EntityState>),
    /// A state_changed event for one entity. `None` means it was removed.
    StateChanged {
        entity_id: String,
        new_state: Option<EntityState>,
    },
    /// A non-state event (service call, automation) named this entity.
    /// The driver may schedule a delayed snapshot refresh off the back
    /// of it, since some integrations update attributes without firing
    /// state_changed.
    EntityTouched { entity_id: String },
}

/// Outcome of feeding one server message through the session.
#[derive(Debug, Default)]
pub struct SessionTurn {
    pub outbound: Vec<ClientMessage>,
    pub events: Vec<SessionEvent>,
}

/// Protocol state machine for one Home Assistant WebSocket session.
///
/// Owns the message-id counter and the pending-request map; performs no
/// I/O itself. The driver feeds it inbound messages and writes whatever
/// it hands back in `SessionTurn::outbound`.
pub struct Session {
    access_token: String,
    state: ConnectionState,
    next_id: u64,
    pending: HashMap<u64, PendingRequest>,
}

impl Session {
    pub fn new(access_token: String) -> Self {
        Self {
            access_token,
            state: ConnectionState::Disconnected,
            next_id: 1,
            pending: HashMap::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The socket is open; authentication starts immediately.
    pub fn on_open(&mut self) -> ClientMessage {
        self.state = ConnectionState::Authenticating;
        ClientMessage::Auth {
            access_token: self.access_token.clone(),
        }
    }

    /// The socket closed or errored. Drops all in-flight requests, which
    /// closes their reply channels.
    pub fn on_disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        if !self.pending.is_empty() {
            debug!(
                count = self.pending.len(),
                "dropping in-flight requests on disconnect"
            );
        }
        self.pending.clear();
    }

    /// Register a caller-issued service call and produce the wire message.
    pub fn call_service(
        &mut self,
        domain: String,
        service: String,
        service_data: Value,
        reply: oneshot::Sender<CommandResult>,
    ) -> ClientMessage {
        let id = self.next_id();
        self.pending.insert(
            id,
            PendingRequest {
                kind: PendingKind::Command(reply),
                issued_at: Instant::now(),
            },
        );
        ClientMessage::CallService {
            id,
            domain,
            service,
            service_data,
        }
    }

    /// Ask for a fresh full snapshot; the result surfaces as
    /// `SessionEvent::Snapshot`.
    pub fn request_states(&mut self) -> ClientMessage {
        let id = self.next_id();
        self.pending.insert(
            id,
            PendingRequest {
                kind: PendingKind::Snapshot,
                issued_at: Instant::now(),
            },
        );
        ClientMessage::GetStates { id }
    }

    fn subscribe(&mut self, event_type: Option<String>) -> ClientMessage {
        let id = self.next_id();
        self.pending.insert(
            id,
            PendingRequest {
                kind: PendingKind::Subscription,
                issued_at: Instant::now(),
            },
        );
        ClientMessage::SubscribeEvents { id, event_type }
    }

    /// Heartbeat. Carries an id so the server accepts it, but is never
    /// registered in the pending map; the pong is informational only.
    pub fn ping(&mut self) -> ClientMessage {
        ClientMessage::Ping { id: self.next_id() }
    }

    /// Drop pending requests older than `max_age`, failing their reply
    /// channels with a timeout. Returns the number expired.
    pub fn expire_pending(&mut self, max_age: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, req)| now.duration_since(req.issued_at) >= max_age)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(req) = self.pending.remove(id) {
                warn!(id, "request timed out waiting for a result");
                if let PendingKind::Command(reply) = req.kind {
                    let _ = reply.send(Err(CommandFailure::Timeout));
                }
            }
        }
        expired.len()
    }

    pub fn handle_message(&mut self, msg: ServerMessage) -> SessionTurn {
        let mut turn = SessionTurn::default();
        match msg {
            ServerMessage::AuthRequired { ha_version } => {
                debug!(ha_version = ?ha_version, "server requested authentication");
            }
            ServerMessage::AuthOk { ha_version } => {
                self.state = ConnectionState::Connected;
                info!(ha_version = ?ha_version, "authenticated with Home Assistant");
                turn.outbound.push(self.request_states());
                turn.outbound.push(self.subscribe(Some("state_changed".to_string())));
                turn.outbound.push(self.subscribe(None));
                turn.events.push(SessionEvent::Authenticated { ha_version });
            }
            ServerMessage::AuthInvalid { message } => {
                let message =
                    message.unwrap_or_else(|| "access token rejected".to_string());
                warn!(reason = %message, "authentication failed");
                self.on_disconnect();
                turn.events.push(SessionEvent::AuthFailed { message });
            }
            ServerMessage::Result {
                id,
                success,
                result,
                error,
            } => {
                self.handle_result(id, success, result, error, &mut turn);
            }
            ServerMessage::Event { event, .. } => {
                self.handle_event(event, &mut turn);
            }
            ServerMessage::Pong { id } => {
                debug!(id, "heartbeat acknowledged");
            }
            ServerMessage::Unknown => {
                debug!("ignoring unrecognized message type");
            }
        }
        turn
    }

    fn handle_result(
        &mut self,
        id: u64,
        success: bool,
        result: Option<Value>,
        error: Option<ErrorObject>,
        turn: &mut SessionTurn,
    ) {
        let Some(pending) = self.pending.remove(&id) else {
            // Late reply for an expired request, or an id we never sent.
            debug!(id, "result for unknown or expired request");
            return;
        };
        match pending.kind {
            PendingKind::Command(reply) => {
                let outcome = if success {
                    Ok(result)
                } else {
                    Err(CommandFailure::Rejected(error.unwrap_or_default()))
                };
                let _ = reply.send(outcome);
            }
            PendingKind::Snapshot => {
                if !success {
                    warn!(
                        id,
                        error = %error.unwrap_or_default(),
                        "get_states request failed"
                    );
                    return;
                }
                match result {
                    Some(value) => match serde_json::from_value::<Vec<EntityState>>(value) {
                        Ok(states) => turn.events.push(SessionEvent::Snapshot(states)),
                        Err(e) => warn!(error = %e, "failed to parse get_states result"),
                    },
                    None => warn!(id, "get_states result carried no payload"),
                }
            }
            PendingKind::Subscription => {
                if success {
                    debug!(id, "event subscription confirmed");
                } else {
                    warn!(
                        id,
                        error = %error.unwrap_or_default(),
                        "event subscription rejected"
                    );
                }
            }
        }
    }

    fn handle_event(&mut self, event: HassEvent, turn: &mut SessionTurn) {
        if event.event_type == "state_changed" {
            match serde_json::from_value::<StateChangedData>(event.data) {
                Ok(data) => turn.events.push(SessionEvent::StateChanged {
                    entity_id: data.entity_id,
                    new_state: data.new_state,
                }),
                Err(e) => warn!(error = %e, "malformed state_changed event"),
            }
            return;
        }
        // call_service events name the entity under service_data; most
        // others (automation_triggered included) put it at the top level.
        let touched = event
            .data
            .get("service_data")
            .and_then(|sd| sd.get("entity_id"))
            .and_then(Value::as_str)
            .or_else(|| event.data.get("entity_id").and_then(Value::as_str));
        if let Some(entity_id) = touched {
            turn.events.push(SessionEvent::EntityTouched {
                entity_id: entity_id.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn authed_session() -> Session {
        let mut session = Session::new("token".to_string());
        session.on_open();
        session.handle_message(ServerMessage::AuthOk { ha_version: None });
        session
    }

    #[test]
    fn test_open_sends_auth() {
        let mut session = Session::new("secret".to_string());
        let msg = session.on_open();
        assert_eq!(session.state(), ConnectionState::Authenticating);
        match msg {
            ClientMessage::Auth { access_token } => assert_eq!(access_token, "secret"),
            other => panic!("expected auth message, got {:?}", other),
        }
    }

    #[test]
    fn test_auth_ok_requests_snapshot_and_subscriptions() {
        let mut session = Session::new("token".to_string());
        session.on_open();
        let turn = session.handle_message(ServerMessage::AuthOk { ha_version: None });

        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(turn.outbound.len(), 3);
        assert!(matches!(turn.outbound[0], ClientMessage::GetStates { id: 1 }));
        match &turn.outbound[1] {
            ClientMessage::SubscribeEvents { id: 2, event_type } => {
                assert_eq!(event_type.as_deref(), Some("state_changed"));
            }
            other => panic!("expected subscribe_events, got {:?}", other),
        }
        match &turn.outbound[2] {
            ClientMessage::SubscribeEvents { id: 3, event_type } => {
                assert!(event_type.is_none());
            }
            other => panic!("expected subscribe_events, got {:?}", other),
        }
        assert!(matches!(
            turn.events[0],
            SessionEvent::Authenticated { .. }
        ));
    }

    #[test]
    fn test_auth_invalid_is_terminal_and_requests_nothing() {
        let mut session = Session::new("bad".to_string());
        session.on_open();
        let (tx, mut rx) = oneshot::channel();
        session.call_service("light".into(), "turn_on".into(), json!({}), tx);

        let turn = session.handle_message(ServerMessage::AuthInvalid {
            message: Some("Invalid access token".to_string()),
        });

        assert!(turn.outbound.is_empty());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.pending_count(), 0);
        match &turn.events[0] {
            SessionEvent::AuthFailed { message } => {
                assert_eq!(message, "Invalid access token");
            }
            other => panic!("expected auth failure, got {:?}", other),
        }
        // The in-flight command's reply channel was dropped, not answered.
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn test_result_resolves_pending_command() {
        let mut session = authed_session();
        let (tx, mut rx) = oneshot::channel();
        let msg = session.call_service(
            "input_text".into(),
            "set_value".into(),
            json!({"entity_id": "input_text.theater_wall_selected_entity"}),
            tx,
        );
        let id = msg.id().unwrap();

        session.handle_message(ServerMessage::Result {
            id,
            success: true,
            result: Some(json!({"ok": true})),
            error: None,
        });

        let outcome = rx.try_recv().unwrap();
        assert_eq!(outcome.unwrap(), Some(json!({"ok": true})));
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_failed_result_rejects_pending_command() {
        let mut session = authed_session();
        let (tx, mut rx) = oneshot::channel();
        let msg = session.call_service("light".into(), "turn_on".into(), json!({}), tx);

        session.handle_message(ServerMessage::Result {
            id: msg.id().unwrap(),
            success: false,
            result: None,
            error: Some(ErrorObject {
                code: Some("not_found".into()),
                message: Some("Service not found".into()),
            }),
        });

        match rx.try_recv().unwrap() {
            Err(CommandFailure::Rejected(err)) => {
                assert_eq!(err.code.as_deref(), Some("not_found"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_result_id_is_ignored() {
        let mut session = authed_session();
        let turn = session.handle_message(ServerMessage::Result {
            id: 9999,
            success: true,
            result: None,
            error: None,
        });
        assert!(turn.outbound.is_empty());
        assert!(turn.events.is_empty());
    }

    #[test]
    fn test_expire_pending_times_out_commands() {
        let mut session = authed_session();
        let (tx, mut rx) = oneshot::channel();
        session.call_service("light".into(), "turn_on".into(), json!({}), tx);

        assert_eq!(session.expire_pending(Duration::ZERO), 1);
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(CommandFailure::Timeout)
        ));
        // A late result for the expired id is silently dropped.
        let turn = session.handle_message(ServerMessage::Result {
            id: 4,
            success: true,
            result: None,
            error: None,
        });
        assert!(turn.events.is_empty());
    }

    #[test]
    fn test_snapshot_result_yields_entities() {
        let mut session = Session::new("token".to_string());
        session.on_open();
        let turn = session.handle_message(ServerMessage::AuthOk { ha_version: None });
        let snapshot_id = turn.outbound[0].id().unwrap();

        let turn = session.handle_message(ServerMessage::Result {
            id: snapshot_id,
            success: true,
            result: Some(json!([
                {"entity_id": "sensor.atlanta_falcons", "state": "PRE", "attributes": {}},
                {"entity_id": "light.lounge", "state": "on", "attributes": {}}
            ])),
            error: None,
        });

        match &turn.events[0] {
            SessionEvent::Snapshot(states) => {
                assert_eq!(states.len(), 2);
                assert_eq!(states[0].entity_id, "sensor.atlanta_falcons");
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_state_changed_event_dispatches_on_event_type() {
        let mut session = authed_session();
        let turn = session.handle_message(ServerMessage::Event {
            id: 2,
            event: HassEvent {
                event_type: "state_changed".to_string(),
                data: json!({
                    "entity_id": "sensor.boston_bruins",
                    "new_state": {
                        "entity_id": "sensor.boston_bruins",
                        "state": "IN",
                        "attributes": {"team_score": "2"}
                    }
                }),
            },
        });
        match &turn.events[0] {
            SessionEvent::StateChanged {
                entity_id,
                new_state,
            } => {
                assert_eq!(entity_id, "sensor.boston_bruins");
                assert_eq!(new_state.as_ref().unwrap().state, "IN");
            }
            other => panic!("expected state change, got {:?}", other),
        }
    }

    #[test]
    fn test_call_service_event_touches_named_entity() {
        let mut session = authed_session();
        let turn = session.handle_message(ServerMessage::Event {
            id: 3,
            event: HassEvent {
                event_type: "call_service".to_string(),
                data: json!({
                    "domain": "homeassistant",
                    "service": "update_entity",
                    "service_data": {"entity_id": "sensor.atlanta_falcons"}
                }),
            },
        });
        match &turn.events[0] {
            SessionEvent::EntityTouched { entity_id } => {
                assert_eq!(entity_id, "sensor.atlanta_falcons");
            }
            other => panic!("expected touched entity, got {:?}", other),
        }
    }

    #[test]
    fn test_ping_allocates_id_without_tracking() {
        let mut session = authed_session();
        let before = session.pending_count();
        let msg = session.ping();
        assert!(msg.id().is_some());
        assert_eq!(session.pending_count(), before);
        // Pong is informational only.
        let turn = session.handle_message(ServerMessage::Pong { id: msg.id().unwrap() });
        assert!(turn.events.is_empty());
    }

    #[test]
    fn test_message_ids_increment_from_one() {
        let mut session = Session::new("token".to_string());
        session.on_open();
        let first = session.request_states();
        let second = session.ping();
        assert_eq!(first.id(), Some(1));
        assert_eq!(second.id(), Some(2));
    }
}
