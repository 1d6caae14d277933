// Wall display configuration
pub mod config;

// State engine and entity cache
pub mod state;

// Home Assistant WebSocket client
pub mod hass;

// Panel geometry, mask CSS, and scoreboard views
pub mod panels;

// Active team selection
pub mod selector;

// Celebration trigger coordination
pub mod celebration;

// HTTP and WebSocket APIs
pub mod api;

// Kiosk subscription management
pub mod subscription;
