// Tracks which game entity the wall is showing. An input_text helper in
// Home Assistant holds the selection so automations and the CLI can
// change it; this module polls the cached helper state and fans the
// active entity out over a watch channel.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::hass::{ClientError, HassClient};
use crate::state::StateEngine;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Helper entity states that mean "nothing selected".
const UNSET_STATES: [&str; 2] = ["unknown", "unavailable"];

/// Turn an entity id into a readable label, e.g.
/// `sensor.atlanta_falcons` becomes `sensor - atlanta falcons`.
pub fn format_entity_name(entity_id: &str) -> String {
    entity_id.replace('_', " ").replace('.', " - ")
}

pub struct TeamSelector {
    helper_entity: String,
    active_tx: watch::Sender<String>,
}

impl TeamSelector {
    /// `initial` is the configured default game entity; the helper
    /// overrides it as soon as it carries a real value.
    pub fn new(initial: String, helper_entity: String) -> TeamSelector {
        let (active_tx, _) = watch::channel(initial);
        TeamSelector {
            helper_entity,
            active_tx,
        }
    }

    pub fn watch(&self) -> watch::Receiver<String> {
        self.active_tx.subscribe()
    }

    pub fn active(&self) -> String {
        self.active_tx.borrow().clone()
    }

    pub fn helper_entity(&self) -> &str {
        &self.helper_entity
    }

    /// Adopt a helper value. Blank and unavailable states are ignored.
    /// Returns true only when the selection actually changed, so a
    /// repeated poll of the same value never causes a refresh.
    pub fn apply_helper_value(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || UNSET_STATES.contains(&value) {
            return false;
        }
        self.active_tx.send_if_modified(|current| {
            if current == value {
                false
            } else {
                *current = value.to_string();
                true
            }
        })
    }

    /// Persist a selection by writing the helper entity in Home
    /// Assistant. On success the active entity switches immediately;
    /// the helper's state_changed echo keeps later polls in agreement.
    pub async fn select_team(&self, hass: &HassClient, entity_id: &str) -> Result<(), ClientError> {
        hass.call_service(
            "input_text",
            "set_value",
            json!({
                "entity_id": self.helper_entity,
                "value": entity_id,
            }),
        )
        .await?;
        if self.apply_helper_value(entity_id) {
            info!(entity_id = %entity_id, "team selection written to helper");
        }
        Ok(())
    }

    /// One poll step: read the helper entity from the cache.
    pub fn poll_once(&self, engine: &StateEngine) -> bool {
        match engine.get_entity(&self.helper_entity) {
            Some(helper) => self.apply_helper_value(&helper.state),
            None => {
                debug!(
                    entity_id = %self.helper_entity,
                    "team helper entity not in cache yet"
                );
                false
            }
        }
    }

    pub fn spawn_poller(self: &Arc<Self>, engine: Arc<StateEngine>) -> JoinHandle<()> {
        let selector = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if selector.poll_once(&engine) {
                    info!(entity_id = %selector.active(), "team selection changed");
                }
            }
        })
    }
}
