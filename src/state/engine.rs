use crate::state::entity::{EntityRemoved, EntityState, StateUpdate};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// In-memory entity cache fed by the Home Assistant event stream.
///
/// A single map from entity id to last known state, overwritten wholesale on
/// every state_changed event. No history, no TTL, no eviction.
pub struct StateEngine {
    /// Lock-free concurrent map for fast reads
    entities: Arc<DashMap<String, EntityState>>,

    /// Broadcast channel for state change events
    state_tx: broadcast::Sender<StateUpdate>,

    /// Broadcast channel for entity removal events
    removal_tx: broadcast::Sender<EntityRemoved>,
}

impl StateEngine {
    /// Create new state engine with broadcast channels
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(1000);
        let (removal_tx, _) = broadcast::channel(100);

        Self {
            entities: Arc::new(DashMap::new()),
            state_tx,
            removal_tx,
        }
    }

    /// Overwrite an entity from a state_changed event (core state mutation).
    ///
    /// `None` means the entity was removed. Returns the broadcast update,
    /// or `None` when the event was a removal or a duplicate delivery
    /// (same state string and attributes as the cached entry).
    pub fn apply_state_changed(
        &self,
        entity_id: &str,
        new_state: Option<EntityState>,
    ) -> Option<StateUpdate> {
        let now = Utc::now();

        let new_state = match new_state {
            Some(state) => state,
            None => {
                if self.entities.remove(entity_id).is_some() {
                    info!(entity_id = %entity_id, "Entity removed");
                    let _ = self.removal_tx.send(EntityRemoved {
                        entity_id: entity_id.to_string(),
                        timestamp: now,
                    });
                }
                return None;
            }
        };

        let old_state = self
            .entities
            .insert(entity_id.to_string(), new_state.clone());

        // The all-events subscription redelivers state_changed; an identical
        // payload is still written (timestamps advance) but not re-broadcast.
        if let Some(ref old) = old_state {
            if old.same_payload(&new_state) {
                debug!(entity_id = %entity_id, "Duplicate state delivery, broadcast suppressed");
                return None;
            }
        }

        let update = StateUpdate {
            entity_id: entity_id.to_string(),
            old_state,
            new_state,
            timestamp: now,
        };

        let _ = self.state_tx.send(update.clone());
        Some(update)
    }

    /// Merge a full get_states snapshot into the cache.
    ///
    /// Entries that differ from the cached state broadcast normally, so a
    /// reconnect snapshot refreshes any connected kiosk. Returns the number
    /// of entities that changed.
    pub fn apply_snapshot(&self, states: Vec<EntityState>) -> usize {
        let total = states.len();
        let mut changed = 0;

        for state in states {
            let entity_id = state.entity_id.clone();
            if self.apply_state_changed(&entity_id, Some(state)).is_some() {
                changed += 1;
            }
        }

        info!(total = total, changed = changed, "Loaded entity snapshot");
        changed
    }

    /// Get entity by ID
    pub fn get_entity(&self, entity_id: &str) -> Option<EntityState> {
        self.entities.get(entity_id).map(|e| e.clone())
    }

    /// Number of cached entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Subscribe to state updates
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.state_tx.subscribe()
    }

    /// Subscribe to entity removal events
    pub fn subscribe_removals(&self) -> broadcast::Receiver<EntityRemoved> {
        self.removal_tx.subscribe()
    }
}

impl Default for StateEngine {
    fn default() -> Self {
        Self::new()
    }
}
