//! Repository Implementations
//!
//! PostgreSQL-backed implementations of the domain repository traits.

mod call_repository;
mod conversation_repository;
mod message_repository;
mod notification_repository;

pub use call_repository::PgCallRepository;
pub use conversation_repository::PgConversationRepository;
pub use message_repository::PgMessageRepository;
pub use notification_repository::PgNotificationRepository;
