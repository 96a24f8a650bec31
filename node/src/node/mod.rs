//! Application layer of a node: ties the local [`Blockchain`] to the relay connection.
use std::fmt::Display;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

use crate::chain::{Block, Blockchain, Transaction};

pub use console::{Console, ConsoleCommand, ConsoleError};
pub use coordinator::NodeCoordinator;

pub mod console;
pub mod coordinator;

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Chain is not initialized yet")]
    NotInitialized,
    #[error("There are no pending transactions to mine")]
    NoPendingTransactions,
    #[error("Node stopped")]
    Stopped,
}

#[derive(Debug)]
pub(crate) enum NodeCommand {
    AddTransaction(Transaction, oneshot::Sender<Result<()>>),
    MineBlock(oneshot::Sender<Result<()>>),
    GetChain(oneshot::Sender<Result<Vec<Block>>>),
    GetStatus(oneshot::Sender<Result<NodeStatus>>),
}

impl Display for NodeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeCommand::AddTransaction(tx, _) => write!(f, "AddTransaction({tx})"),
            NodeCommand::MineBlock(_) => write!(f, "MineBlock"),
            NodeCommand::GetChain(_) => write!(f, "GetChain"),
            NodeCommand::GetStatus(_) => write!(f, "GetStatus"),
        }
    }
}

/// Snapshot of the node state, published after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub chain_length: usize,
    pub tip_hash: Option<String>,
    pub is_mining: bool,
    pub pending_transactions: usize,
    pub status_line: &'static str,
}

impl From<&Blockchain> for NodeStatus {
    fn from(blockchain: &Blockchain) -> Self {
        Self {
            chain_length: blockchain.chain().len(),
            tip_hash: blockchain.latest_block().map(|block| block.hash.clone()),
            is_mining: blockchain.is_mining(),
            pending_transactions: blockchain.pending_transactions().len(),
            status_line: blockchain.status_line(),
        }
    }
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (blocks: {}, pending transactions: {})",
            self.status_line, self.chain_length, self.pending_transactions
        )
    }
}

/// Interface to a running [`NodeCoordinator`]. Cheap to clone.
#[derive(Clone)]
pub struct NodeHandle {
    pub(crate) commands_channel: mpsc::Sender<NodeCommand>,
    pub(crate) status: watch::Receiver<NodeStatus>,
}

impl NodeHandle {
    pub async fn add_transaction(&self, transaction: Transaction) -> Result<()> {
        log::trace!("add_transaction({transaction})");
        self.send_and_wait_response(|tx| NodeCommand::AddTransaction(transaction, tx))
            .await
    }

    /// Asks the network to mine the pending transactions and starts mining them locally.
    pub async fn mine_block(&self) -> Result<()> {
        log::trace!("mine_block()");
        self.send_and_wait_response(NodeCommand::MineBlock).await
    }

    pub async fn chain(&self) -> Result<Vec<Block>> {
        log::trace!("chain()");
        self.send_and_wait_response(NodeCommand::GetChain).await
    }

    pub async fn status(&self) -> Result<NodeStatus> {
        self.send_and_wait_response(NodeCommand::GetStatus).await
    }

    /// Changes whenever the node state changes.
    pub fn subscribe_status(&self) -> watch::Receiver<NodeStatus> {
        self.status.clone()
    }

    async fn send_and_wait_response<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(oneshot::Sender<Result<R>>) -> NodeCommand,
    {
        let (tx, rcv) = oneshot::channel();
        let cmd = f(tx);
        if let Err(err) = self.commands_channel.send(cmd).await {
            log::error!("Failed to send command {} to node", err.0);
            return Err(NodeError::Stopped);
        }
        rcv.await.map_err(|_| NodeError::Stopped)?
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_status_from_chain() {
        let mut blockchain = Blockchain::new("0");
        blockchain.initialize_with(vec![Block::mine("0".into(), 0, vec![], "0")]);
        blockchain.add_transaction(Transaction::new("alice", "bob", 5));

        let status = NodeStatus::from(&blockchain);

        assert_eq!(status.chain_length, 1);
        assert_eq!(status.tip_hash, blockchain.latest_block().map(|b| b.hash.clone()));
        assert_eq!(status.pending_transactions, 1);
        assert_eq!(
            status.to_string(),
            "Ready to mine a new block. (blocks: 1, pending transactions: 1)"
        );
    }

    #[tokio::test]
    async fn test_handle_of_stopped_node() {
        let (commands_channel, commands_rcv) = mpsc::channel(1);
        let (_, status) = watch::channel(NodeStatus::from(&Blockchain::default()));
        let handle = NodeHandle {
            commands_channel,
            status,
        };
        drop(commands_rcv);

        assert_matches!(handle.chain().await, Err(NodeError::Stopped));
    }
}
