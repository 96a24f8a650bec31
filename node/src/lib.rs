//! Keeps the chains of a set of nodes in sync through a central websocket relay.
//!
//! Nodes connect to a [`relay::RelayServer`] through a [`transport::TransportController`]
//! and exchange the messages defined in [`protocol`]. The [`node::NodeCoordinator`] glues a
//! local [`chain::Blockchain`] to that connection.
pub mod chain;
pub mod cli;
pub mod config;
pub mod core;
pub mod logging;
pub mod node;
pub mod protocol;
pub mod relay;
pub mod transport;
pub mod utilities;
