use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::protocol::Message;
use crate::transport::Result;
use crate::utilities::CorrelationId;

pub(crate) type ReplySender = oneshot::Sender<Result<Message>>;

/// Requests waiting for a reply, keyed by correlation id.
///
/// An entry leaves the table exactly once: either a reply took it or the send failed.
#[derive(Default)]
pub(crate) struct PendingRequests {
    requests: HashMap<CorrelationId, ReplySender>,
}

impl PendingRequests {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the sender back if the id is already taken.
    pub(crate) fn register(
        &mut self,
        correlation_id: CorrelationId,
        reply: ReplySender,
    ) -> std::result::Result<(), ReplySender> {
        if self.requests.contains_key(&correlation_id) {
            return Err(reply);
        }
        self.requests.insert(correlation_id, reply);
        Ok(())
    }

    pub(crate) fn take(&mut self, correlation_id: &str) -> Option<ReplySender> {
        self.requests.remove(correlation_id)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, correlation_id: &str) -> bool {
        self.requests.contains_key(correlation_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_take_removes_entry() {
        let mut pending = PendingRequests::new();
        let (tx, _rx) = oneshot::channel();
        pending.register("1".into(), tx).unwrap();

        assert!(pending.take("1").is_some());
        assert!(pending.take("1").is_none());
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn test_register_same_id_twice() {
        let mut pending = PendingRequests::new();
        let (first, _first_rx) = oneshot::channel();
        let (second, _second_rx) = oneshot::channel();

        pending.register("1".into(), first).unwrap();

        assert!(pending.register("1".into(), second).is_err());
        assert_eq!(pending.len(), 1);
    }
}
