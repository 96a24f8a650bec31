use std::collections::BTreeMap;
use std::fmt::Display;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node connected to the relay.
///
/// Frames pushed to `sender` are written to the socket by the connection's writer task.
/// Once that task stops the channel closes and the connection counts as dead.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub address: Option<SocketAddr>,
    sender: mpsc::UnboundedSender<WsMessage>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        address: Option<SocketAddr>,
        sender: mpsc::UnboundedSender<WsMessage>,
    ) -> Self {
        Self {
            id,
            address,
            sender,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    pub fn send(&self, text: &str) -> bool {
        self.sender.send(WsMessage::Text(text.to_string())).is_ok()
    }
}

/// Live connections, iterated in connection order.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    connections: BTreeMap<ConnectionId, Connection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, connection: Connection) {
        self.connections.insert(connection.id, connection);
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.keys().copied()
    }

    /// Drops every connection whose writer has stopped. Returns what was dropped.
    pub fn sweep_dead(&mut self) -> Vec<ConnectionId> {
        let dead = self
            .connections
            .values()
            .filter(|c| !c.is_alive())
            .map(|c| c.id)
            .collect::<Vec<_>>();
        for id in &dead {
            self.connections.remove(id);
        }
        dead
    }

    /// Sends `text` to every live connection except `sender`.
    pub fn broadcast_except(&self, sender: ConnectionId, text: &str) {
        for connection in self.connections.values() {
            if connection.id == sender || !connection.is_alive() {
                continue;
            }
            if !connection.send(text) {
                log::warn!("Failed to forward message to {}", connection.id);
            }
        }
    }

    pub fn reply_to(&self, recipient: ConnectionId, text: &str) {
        match self.connections.get(&recipient) {
            Some(connection) => {
                if !connection.send(text) {
                    log::warn!("Failed to reply to {recipient}, connection is gone");
                }
            }
            None => log::warn!("Failed to reply to {recipient}, not connected"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn connection(id: u64) -> (Connection, mpsc::UnboundedReceiver<WsMessage>) {
        let (tx, rcv) = mpsc::unbounded_channel();
        (Connection::new(ConnectionId(id), None, tx), rcv)
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let mut set = ConnectionSet::new();
        let (a, mut a_rcv) = connection(1);
        let (b, mut b_rcv) = connection(2);
        set.add(a);
        set.add(b);

        set.broadcast_except(ConnectionId(1), "hello");

        assert!(a_rcv.try_recv().is_err());
        assert_eq!(b_rcv.try_recv().unwrap(), WsMessage::Text("hello".into()));
    }

    #[test]
    fn test_sweep_dead_connections() {
        let mut set = ConnectionSet::new();
        let (a, _a_rcv) = connection(1);
        let (b, b_rcv) = connection(2);
        set.add(a);
        set.add(b);

        drop(b_rcv);
        let dead = set.sweep_dead();

        assert_eq!(dead, vec![ConnectionId(2)]);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec![ConnectionId(1)]);
    }
}
