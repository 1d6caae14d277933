use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::EntityState;

/// Messages received from the Home Assistant WebSocket API, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<ErrorObject>,
    },
    Event {
        id: u64,
        event: HassEvent,
    },
    Pong {
        id: u64,
    },
    #[serde(other)]
    Unknown,
}

/// Error payload attached to a failed `result` message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl std::fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{} ({})", message, code),
            (Some(code), None) => write!(f, "error code {}", code),
            (None, Some(message)) => write!(f, "{}", message),
            (None, None) => write!(f, "unknown error"),
        }
    }
}

/// An event pushed on an active subscription. Dispatch happens on
/// `event_type`; the `data` shape varies per event.
#[derive(Debug, Clone, Deserialize)]
pub struct HassEvent {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// Payload of a `state_changed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct StateChangedData {
    pub entity_id: String,
    #[serde(default)]
    pub old_state: Option<EntityState>,
    #[serde(default)]
    pub new_state: Option<EntityState>,
}

/// Messages sent to Home Assistant. Every post-auth command carries an
/// `id` the server echoes back on its `result`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth {
        access_token: String,
    },
    GetStates {
        id: u64,
    },
    SubscribeEvents {
        id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        event_type: Option<String>,
    },
    CallService {
        id: u64,
        domain: String,
        service: String,
        service_data: Value,
    },
    Ping {
        id: u64,
    },
}

impl ClientMessage {
    pub fn id(&self) -> Option<u64> {
        match self {
            ClientMessage::Auth { .. } => None,
            ClientMessage::GetStates { id }
            | ClientMessage::SubscribeEvents { id, .. }
            | ClientMessage::CallService { id, .. }
            | ClientMessage::Ping { id } => Some(*id),
        }
    }
}
