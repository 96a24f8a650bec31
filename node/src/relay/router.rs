use serde_json::Value;

use crate::logging::pretty_json;
use crate::protocol::{MessageType, RawMessage};
use crate::relay::quorum::QuorumRounds;
use crate::relay::{Connection, ConnectionId, ConnectionSet, RelayEvent};

/// Routes messages between connected nodes by message type.
///
/// Owns the connection set and the open quorum rounds. It is driven by one task, so
/// handlers never run concurrently.
#[derive(Debug, Default)]
pub struct MessageRouter {
    pub(crate) connections: ConnectionSet,
    pub(crate) rounds: QuorumRounds,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    pub fn open_rounds(&self) -> usize {
        self.rounds.len()
    }

    pub fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connected(connection) => self.on_connected(connection),
            RelayEvent::Message { sender, text } => self.on_message(sender, &text),
            RelayEvent::Closed(id) => self.on_closed(id),
            RelayEvent::TransportError { connection, error } => {
                self.on_transport_error(connection, &error)
            }
        }
    }

    pub fn on_connected(&mut self, connection: Connection) {
        log::info!(
            "Node {} connected from {:?}, {} connected",
            connection.id,
            connection.address,
            self.connections.len() + 1
        );
        self.connections.add(connection);
    }

    pub fn on_closed(&mut self, id: ConnectionId) {
        if self.connections.remove(id).is_some() {
            log::info!(
                "Node {id} disconnected, {} connected",
                self.connections.len()
            );
        }
    }

    /// Any transport failure triggers a sweep of connections that are already dead.
    pub fn on_transport_error(&mut self, connection: Option<ConnectionId>, error: &str) {
        match connection {
            Some(id) => log::error!("Transport error on {id}: {error}"),
            None => log::error!("Transport error: {error}"),
        }
        let dead = self.connections.sweep_dead();
        if !dead.is_empty() {
            log::debug!("Dropped dead connections: {dead:?}");
        }
    }

    pub fn on_message(&mut self, sender: ConnectionId, text: &str) {
        let message = match RawMessage::from_json(text) {
            Ok(message) => message,
            Err(err) => {
                log::error!("Dropping malformed message from {sender}: {err}");
                return;
            }
        };
        log::trace!("Message from {sender}: {}", pretty_json(&message));

        match message.kind() {
            Ok(MessageType::GetLongestChainRequest) => {
                self.handle_longest_chain_request(sender, message, text)
            }
            Ok(MessageType::GetLongestChainResponse) => {
                self.handle_longest_chain_response(sender, message)
            }
            Ok(MessageType::NewBlockRequest) | Ok(MessageType::NewBlockAnnouncement) => {
                log::debug!("Broadcasting {message} from {sender}");
                self.connections.broadcast_except(sender, text);
            }
            Err(err) => log::warn!("Received message from {sender} that can't be routed: {err}"),
        }
    }

    fn handle_longest_chain_request(
        &mut self,
        requester: ConnectionId,
        message: RawMessage,
        text: &str,
    ) {
        if self.connections.len() > 1 {
            log::debug!("Asking other nodes for the longest chain, {message} from {requester}");
            self.rounds.open(message.correlation_id, requester);
            self.connections.broadcast_except(requester, text);
        } else {
            //Alone in the network, nobody else has a chain
            log::debug!("{requester} is the only node, replying with empty chain");
            let reply = RawMessage::new(
                MessageType::GetLongestChainResponse,
                message.correlation_id,
                Some(Value::Array(vec![])),
            );
            self.reply(requester, &reply);
        }
    }

    fn handle_longest_chain_response(&mut self, sender: ConnectionId, message: RawMessage) {
        let correlation_id = message.correlation_id.clone();
        let Some(round) = self.rounds.get_mut(&correlation_id) else {
            log::debug!("No open round for {message} from {sender}, ignoring");
            return;
        };

        round.record(sender, message);
        log::debug!(
            "Round {correlation_id}: {} replies, awaiting {}",
            round.reply_count(),
            round.awaiting(&self.connections)
        );
        if !round.is_complete(&self.connections) {
            return;
        }

        if let Some(round) = self.rounds.close(&correlation_id) {
            let requester = round.requester;
            if let Some(longest) = round.into_longest_reply() {
                log::debug!(
                    "Round {correlation_id} complete, longest chain has {} blocks",
                    longest.chain_length()
                );
                let payload = longest.payload.or(Some(Value::Array(vec![])));
                let reply = RawMessage::new(
                    MessageType::GetLongestChainResponse,
                    correlation_id,
                    payload,
                );
                self.reply(requester, &reply);
            }
        }
    }

    fn reply(&self, recipient: ConnectionId, message: &RawMessage) {
        match message.to_json() {
            Ok(json) => self.connections.reply_to(recipient, &json),
            Err(err) => log::error!("Failed to serialize {message}: {err}"),
        }
    }
}
