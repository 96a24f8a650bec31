//! Client side of the relay connection.
//!
//! A [`TransportController`] owns a single websocket connection and multiplexes
//! requests over it. Replies are matched to requests by correlation id. Everything that
//! is not a reply is handed to the owner as an unsolicited message.
use thiserror::Error;

use crate::protocol::MessageError;

pub use controller::{TransportController, UnsolicitedMessages};

pub mod controller;
pub(crate) mod pending;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection to relay failed: {0}")]
    ConnectionFailed(String),
    #[error("Connection to relay is closed")]
    ConnectionClosed,
    #[error("Failed to send message: {0}")]
    Send(String),
    #[error("Malformed message: {0}")]
    Malformed(#[from] MessageError),
    #[error("A request with correlation id {0} is already waiting for a reply")]
    DuplicateCorrelationId(String),
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
    #[error("Transport controller stopped")]
    ControllerStopped,
}
