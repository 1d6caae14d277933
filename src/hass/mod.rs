// Home Assistant WebSocket client: auth handshake, request correlation,
// event subscriptions, and reconnect policy.

mod client;
mod protocol;
mod session;

pub use client::{ClientError, ConnectionStatus, HassClient};
pub use protocol::{ClientMessage, ErrorObject, HassEvent, ServerMessage, StateChangedData};
pub use session::{CommandFailure, CommandResult, ConnectionState, Session, SessionEvent, SessionTurn};
