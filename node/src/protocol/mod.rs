pub use message::{Message, MessageBody, MessageError, MessageType, RawMessage};

pub mod message;
