//! Central relay every node connects to.
//!
//! The relay forwards mining requests and block announcements to every other node and
//! turns a "give me the longest chain" request into one reply, collected from all other
//! connected nodes (see [`quorum`]).
//!
//! All relay state lives in one [`router::MessageRouter`] owned by the task running
//! [`RelayServer::run`]. Connection tasks only talk to it through [`RelayEvent`]s.
pub use connections::{Connection, ConnectionId, ConnectionSet};
pub use router::MessageRouter;
pub use server::RelayServer;

pub mod connections;
pub mod quorum;
pub mod router;
pub mod server;

#[derive(Debug)]
pub enum RelayEvent {
    Connected(Connection),
    Message { sender: ConnectionId, text: String },
    Closed(ConnectionId),
    /// A transport level failure, `connection` is `None` when it happened before the
    /// connection was registered (e.g. a failed handshake).
    TransportError {
        connection: Option<ConnectionId>,
        error: String,
    },
}
