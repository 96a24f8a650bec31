//! Local ledger owned by a single node.
//!
//! Blocks are produced by brute-force proof-of-work and only accepted when they extend
//! the current tip. Nothing here knows about the network; see [`crate::node`] for how
//! blocks travel between nodes.
use thiserror::Error;

pub use block::{Block, Transaction};
pub use blockchain::{Blockchain, MiningJob};

pub mod block;
pub mod blockchain;

/// Proof-of-work requirement used when none is configured.
pub const DEFAULT_HASH_PREFIX: &str = "0000";

pub type Result<T> = std::result::Result<T, ChainError>;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Chain is empty, initialize it first")]
    EmptyChain,
    #[error("Block rejected: there is no block in the chain with hash {0}")]
    UnknownPredecessor(String),
    #[error("Block rejected: the longer tail of the current node takes precedence")]
    LongerTailTakesPrecedence,
    #[error("Block rejected: hash verification failed for {0}")]
    InvalidHash(String),
    #[error("Mining failed: {0}")]
    Mining(String),
}
