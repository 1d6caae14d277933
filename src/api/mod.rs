// HTTP and WebSocket APIs

pub mod celebration;
pub mod env;
pub mod static_files;
pub mod status;
pub mod team;
pub mod websocket;

pub use celebration::{create_celebration_router, CelebrationAppState};
pub use env::{create_env_router, EnvAppState};
pub use static_files::{create_static_router, StaticAppState};
pub use status::{create_status_router, StatusAppState};
pub use team::{create_team_router, ha_rest_base_url, TeamAppState};
pub use websocket::{create_ws_router, ws_handler, WsAppState};
