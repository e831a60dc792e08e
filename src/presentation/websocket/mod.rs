//! WebSocket Gateway
//!
//! Transport gateway for real-time coordination events.

pub mod handler;

pub use handler::ws_handler;
