//! # Application Layer
//!
//! The coordination components: typed event vocabulary, connection
//! registry, presence tracker, token verification, and the services that
//! implement messaging, notification fan-out, and call signaling.

pub mod auth;
pub mod events;
pub mod presence;
pub mod registry;
pub mod services;

pub use auth::{JwtVerifier, TokenVerifier};
pub use events::{ClientEvent, ServerEvent};
pub use presence::PresenceTracker;
pub use registry::{Connection, ConnectionRegistry, PresenceTransition};
pub use services::{CallSignaling, MessagingCoordinator, NotificationFanout, SignalKind};
