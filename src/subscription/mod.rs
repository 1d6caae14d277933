// Kiosk-facing WebSocket fan-out

pub mod manager;
pub mod protocol;

pub use manager::ConnectionManager;
pub use protocol::{
    CelebrationMessage, ClientMessage, ConfigMessage, ErrorMessage, PanelUpdateMessage,
    StateUpdateMessage, StatusMessage,
};
