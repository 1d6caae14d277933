use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A Home Assistant entity state as delivered by the websocket API.
///
/// Attributes are an untyped bag of sport-specific fields (team abbreviation,
/// score, quarter, clock, venue, ...) selected dynamically by sport type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityState {
    /// Entity identifier (e.g., "sensor.atlanta_falcons")
    pub entity_id: String,

    /// Primary state string
    pub state: String,

    /// Attribute bag, passed through untyped
    #[serde(default)]
    pub attributes: Map<String, Value>,

    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl EntityState {
    /// True when state string and attributes match, ignoring timestamps.
    ///
    /// The dual event subscription delivers each state_changed twice; this
    /// is the comparison used to suppress the duplicate broadcast.
    pub fn same_payload(&self, other: &EntityState) -> bool {
        self.state == other.state && self.attributes == other.attributes
    }

    /// Attribute lookup as a string slice, if present and a string
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// State update broadcast to subscribers when an entity is overwritten
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateUpdate {
    pub entity_id: String,
    pub old_state: Option<EntityState>,
    pub new_state: EntityState,
    pub timestamp: DateTime<Utc>,
}

/// Broadcast when an entity disappears (state_changed with null new_state)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityRemoved {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
}
