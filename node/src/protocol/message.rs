//! Messages exchanged between nodes and the relay.
//!
//! On the wire every message is a JSON object:
//! `{ "type": <string>, "correlationId": <string>, "payload": <optional> }`.
//!
//! [`RawMessage`] is that envelope with an opaque payload. The relay only ever looks at
//! the envelope. Nodes convert it into a typed [`Message`].
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::chain::{Block, Transaction};
use crate::utilities::{generate_correlation_id, CorrelationId};

pub type Result<T> = std::result::Result<T, MessageError>;

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Unknown message type: \"{0}\"")]
    UnknownType(String),
    #[error("Invalid payload for {message_type}: {reason}")]
    InvalidPayload {
        message_type: MessageType,
        reason: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    GetLongestChainRequest,
    GetLongestChainResponse,
    /// Someone started mining these transactions, peers race to mine the same.
    NewBlockRequest,
    /// A block is final, peers should adopt it.
    NewBlockAnnouncement,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::GetLongestChainRequest => "GetLongestChainRequest",
            MessageType::GetLongestChainResponse => "GetLongestChainResponse",
            MessageType::NewBlockRequest => "NewBlockRequest",
            MessageType::NewBlockAnnouncement => "NewBlockAnnouncement",
        }
    }
}

impl Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = MessageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "GetLongestChainRequest" => Ok(MessageType::GetLongestChainRequest),
            "GetLongestChainResponse" => Ok(MessageType::GetLongestChainResponse),
            "NewBlockRequest" => Ok(MessageType::NewBlockRequest),
            "NewBlockAnnouncement" => Ok(MessageType::NewBlockAnnouncement),
            other => Err(MessageError::UnknownType(other.to_string())),
        }
    }
}

/// Message envelope as it travels over the wire.
///
/// The type is kept as a string so that messages of types unknown to this version
/// still parse and can be logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl RawMessage {
    pub fn new(
        message_type: MessageType,
        correlation_id: CorrelationId,
        payload: Option<Value>,
    ) -> Self {
        Self {
            message_type: message_type.to_string(),
            correlation_id,
            payload,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn kind(&self) -> Result<MessageType> {
        self.message_type.parse()
    }

    /// Length of the chain carried in the payload. Anything that is not a JSON array
    /// counts as an empty chain.
    pub fn chain_length(&self) -> usize {
        match &self.payload {
            Some(Value::Array(blocks)) => blocks.len(),
            _ => 0,
        }
    }
}

impl Display for RawMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.message_type, self.correlation_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    GetLongestChainRequest,
    GetLongestChainResponse(Vec<Block>),
    NewBlockRequest(Vec<Transaction>),
    NewBlockAnnouncement(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub correlation_id: CorrelationId,
    pub body: MessageBody,
}

impl Message {
    pub fn new(correlation_id: CorrelationId, body: MessageBody) -> Self {
        Self {
            correlation_id,
            body,
        }
    }

    pub fn longest_chain_request() -> Self {
        Self::new(generate_correlation_id(), MessageBody::GetLongestChainRequest)
    }

    /// Reply to a longest chain request, it must carry the request's correlation id.
    pub fn longest_chain_response(correlation_id: CorrelationId, chain: Vec<Block>) -> Self {
        Self::new(correlation_id, MessageBody::GetLongestChainResponse(chain))
    }

    pub fn new_block_request(transactions: Vec<Transaction>) -> Self {
        Self::new(
            generate_correlation_id(),
            MessageBody::NewBlockRequest(transactions),
        )
    }

    pub fn new_block_announcement(block: Block) -> Self {
        Self::new(
            generate_correlation_id(),
            MessageBody::NewBlockAnnouncement(block),
        )
    }

    pub fn message_type(&self) -> MessageType {
        match self.body {
            MessageBody::GetLongestChainRequest => MessageType::GetLongestChainRequest,
            MessageBody::GetLongestChainResponse(_) => MessageType::GetLongestChainResponse,
            MessageBody::NewBlockRequest(_) => MessageType::NewBlockRequest,
            MessageBody::NewBlockAnnouncement(_) => MessageType::NewBlockAnnouncement,
        }
    }

    pub fn to_raw(&self) -> Result<RawMessage> {
        let payload = match &self.body {
            MessageBody::GetLongestChainRequest => None,
            MessageBody::GetLongestChainResponse(chain) => Some(serde_json::to_value(chain)?),
            MessageBody::NewBlockRequest(transactions) => Some(serde_json::to_value(transactions)?),
            MessageBody::NewBlockAnnouncement(block) => Some(serde_json::to_value(block)?),
        };
        Ok(RawMessage::new(
            self.message_type(),
            self.correlation_id.clone(),
            payload,
        ))
    }

    pub fn to_json(&self) -> Result<String> {
        self.to_raw()?.to_json()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        RawMessage::from_json(json)?.try_into()
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.message_type(), self.correlation_id)
    }
}

impl TryFrom<RawMessage> for Message {
    type Error = MessageError;

    fn try_from(raw: RawMessage) -> std::result::Result<Self, Self::Error> {
        let message_type = raw.kind()?;
        let body = match message_type {
            MessageType::GetLongestChainRequest => MessageBody::GetLongestChainRequest,
            MessageType::GetLongestChainResponse => {
                MessageBody::GetLongestChainResponse(payload(message_type, raw.payload)?)
            }
            MessageType::NewBlockRequest => {
                MessageBody::NewBlockRequest(payload(message_type, raw.payload)?)
            }
            MessageType::NewBlockAnnouncement => {
                MessageBody::NewBlockAnnouncement(payload(message_type, raw.payload)?)
            }
        };
        Ok(Message::new(raw.correlation_id, body))
    }
}

fn payload<T: for<'de> Deserialize<'de>>(
    message_type: MessageType,
    payload: Option<Value>,
) -> Result<T> {
    let value = payload.ok_or_else(|| MessageError::InvalidPayload {
        message_type,
        reason: "missing payload".to_string(),
    })?;
    serde_json::from_value(value).map_err(|err| MessageError::InvalidPayload {
        message_type,
        reason: err.to_string(),
    })
}
