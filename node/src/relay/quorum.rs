//! Bookkeeping for "longest chain" requests.
//!
//! The relay fans a request out to every other node and collects one reply per node.
//! A round is complete when the only connected node without a recorded reply is the
//! requester itself. The reply with the longest chain wins, ties go to the earliest reply.
//!
//! The round assumes nobody connects or disconnects while it is open. A node that
//! disconnects before replying can leave the round open forever, nothing times it out.
use std::collections::HashMap;

use crate::protocol::RawMessage;
use crate::relay::{ConnectionId, ConnectionSet};
use crate::utilities::CorrelationId;

#[derive(Debug)]
pub struct QuorumRound {
    pub requester: ConnectionId,
    /// Replies in arrival order, one per responder.
    replies: Vec<(ConnectionId, RawMessage)>,
}

impl QuorumRound {
    pub fn new(requester: ConnectionId) -> Self {
        Self {
            requester,
            replies: vec![],
        }
    }

    /// A second reply from the same connection replaces the first one in place.
    pub fn record(&mut self, responder: ConnectionId, reply: RawMessage) {
        match self.replies.iter_mut().find(|(id, _)| *id == responder) {
            Some((_, existing)) => *existing = reply,
            None => self.replies.push((responder, reply)),
        }
    }

    pub fn has_replied(&self, connection: ConnectionId) -> bool {
        self.replies.iter().any(|(id, _)| *id == connection)
    }

    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }

    /// Connected nodes without a recorded reply. The requester is one of them.
    pub fn awaiting(&self, connections: &ConnectionSet) -> usize {
        connections.ids().filter(|id| !self.has_replied(*id)).count()
    }

    pub fn is_complete(&self, connections: &ConnectionSet) -> bool {
        self.awaiting(connections) == 1
    }

    pub fn into_longest_reply(self) -> Option<RawMessage> {
        let mut longest: Option<RawMessage> = None;
        for (_, reply) in self.replies {
            let is_longer = longest
                .as_ref()
                .map_or(true, |current| reply.chain_length() > current.chain_length());
            if is_longer {
                longest = Some(reply);
            }
        }
        longest
    }
}

/// Open rounds keyed by the correlation id of the original request.
#[derive(Debug, Default)]
pub struct QuorumRounds {
    rounds: HashMap<CorrelationId, QuorumRound>,
}

impl QuorumRounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, correlation_id: CorrelationId, requester: ConnectionId) {
        if self
            .rounds
            .insert(correlation_id.clone(), QuorumRound::new(requester))
            .is_some()
        {
            log::warn!("Round {correlation_id} restarted by {requester}");
        }
    }

    pub fn get_mut(&mut self, correlation_id: &str) -> Option<&mut QuorumRound> {
        self.rounds.get_mut(correlation_id)
    }

    pub fn close(&mut self, correlation_id: &str) -> Option<QuorumRound> {
        self.rounds.remove(correlation_id)
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.rounds.contains_key(correlation_id)
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::protocol::MessageType;
    use crate::relay::Connection;

    use super::*;

    fn reply(chain: serde_json::Value) -> RawMessage {
        RawMessage::new(MessageType::GetLongestChainResponse, "r".into(), Some(chain))
    }

    fn connections(count: u64) -> ConnectionSet {
        let mut set = ConnectionSet::new();
        for id in 0..count {
            //Receivers are dropped, only membership matters here
            let (tx, _) = mpsc::unbounded_channel();
            set.add(Connection::new(ConnectionId(id), None, tx));
        }
        set
    }

    #[test]
    fn test_longest_reply_wins() {
        let mut round = QuorumRound::new(ConnectionId(0));
        round.record(ConnectionId(1), reply(json!([1])));
        round.record(ConnectionId(2), reply(json!([1, 2, 3])));
        round.record(ConnectionId(3), reply(json!([1, 2])));

        assert_eq!(round.into_longest_reply().unwrap().chain_length(), 3);
    }

    #[test]
    fn test_tie_goes_to_first_reply() {
        let mut round = QuorumRound::new(ConnectionId(0));
        round.record(ConnectionId(2), reply(json!(["first", "x"])));
        round.record(ConnectionId(1), reply(json!(["second", "y"])));

        let longest = round.into_longest_reply().unwrap();

        assert_eq!(longest.payload, Some(json!(["first", "x"])));
    }

    #[test]
    fn test_repeated_reply_keeps_position() {
        let mut round = QuorumRound::new(ConnectionId(0));
        round.record(ConnectionId(1), reply(json!([1])));
        round.record(ConnectionId(2), reply(json!([2, 2])));
        round.record(ConnectionId(1), reply(json!([3, 3])));

        assert_eq!(round.reply_count(), 2);
        assert_eq!(
            round.into_longest_reply().unwrap().payload,
            Some(json!([3, 3]))
        );
    }

    #[test]
    fn test_complete_when_only_requester_is_left() {
        let set = connections(3);
        let mut round = QuorumRound::new(ConnectionId(0));

        round.record(ConnectionId(1), reply(json!([])));
        assert_eq!(round.awaiting(&set), 2);
        assert!(!round.is_complete(&set));

        round.record(ConnectionId(2), reply(json!([])));
        assert!(round.is_complete(&set));
    }

    #[test]
    fn test_empty_round_has_no_reply() {
        assert!(QuorumRound::new(ConnectionId(0)).into_longest_reply().is_none());
    }
}
