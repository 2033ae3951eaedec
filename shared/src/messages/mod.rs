pub mod channel_mode;
pub mod error;
pub mod message_type;
pub mod request;
pub mod router;
pub mod system_messages;
