//! Domain entities and their repository traits.

pub mod call;
pub mod conversation;
pub mod message;
pub mod notification;

pub use call::{Call, CallRepository, CallStatus, CallType};
pub use conversation::{Conversation, ConversationRepository};
pub use message::{Message, MessageRepository, MessageType, ReadReceipt};
pub use notification::{Notification, NotificationRepository, NotificationType};
