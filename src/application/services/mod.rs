//! Application services: the coordination components behind the gateway.

pub mod calls;
pub mod messaging;
pub mod notifications;

pub use calls::{CallSignaling, SignalKind};
pub use messaging::MessagingCoordinator;
pub use notifications::{NotificationContext, NotificationFanout};
