// Entity cache fed by Home Assistant state_changed events

mod engine;
mod entity;

pub use engine::StateEngine;
pub use entity::{EntityRemoved, EntityState, StateUpdate};
