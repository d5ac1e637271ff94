//! Real-time ticket chat
//!
//! # Architecture
//!
//! - **Hub**: single-task registry of ticket rooms, fan-out with slow-consumer eviction
//! - **Session**: per-connection handshake plus inbound/outbound pumps
//! - **Events**: chat wire format
//! - **Handler**: Axum WebSocket route handler

pub mod events;
pub mod handler;
pub mod hub;
pub mod session;

pub use events::ChatMessage;
pub use handler::ws_handler;
pub use hub::{Hub, HubHandle, HubStats, Participant, SessionKey};
pub use session::{SessionContext, SessionSettings};
