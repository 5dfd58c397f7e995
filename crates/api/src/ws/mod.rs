//! Real-time socket layer.
//!
//! `GET /socket` upgrades to a WebSocket. Connections are tracked by
//! [`WsManager`], pinged by the heartbeat task and closed on shutdown.
//! Inbound messages are not dispatched anywhere yet.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::{require_allowed_origin, ws_handler};
pub use heartbeat::{start_heartbeat, HEARTBEAT_INTERVAL};
pub use manager::WsManager;
