//! Helpdesk API Library
//!
//! Token issuance and revocation, the refresh cookie codec, and real-time
//! per-ticket chat over WebSocket.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;
pub mod store;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
