use tokio::sync::{mpsc, watch};

use crate::chain::{self, Block, Blockchain, MiningJob, Transaction};
use crate::config::NodeConfiguration;
use crate::core::Shutdown;
use crate::node::{NodeCommand, NodeError, NodeHandle, NodeStatus, Result};
use crate::protocol::{Message, MessageBody};
use crate::transport::controller::UnsolicitedMessages;
use crate::transport::{self, TransportController};

const COMMANDS_CHANNEL_SIZE: usize = 100;

/// Outcome of a mining job that ran off the coordinator task.
type MinedBlock = chain::Result<Block>;

/// Owns the local chain and keeps it in sync with the rest of the network.
///
/// Everything that touches the chain runs on the task executing [`NodeCoordinator::run`].
pub struct NodeCoordinator {
    blockchain: Blockchain,
    transport: TransportController,
    unsolicited: UnsolicitedMessages,
    commands_rcv: mpsc::Receiver<NodeCommand>,
    mined_tx: mpsc::UnboundedSender<MinedBlock>,
    mined_rcv: mpsc::UnboundedReceiver<MinedBlock>,
    status_tx: watch::Sender<NodeStatus>,
}

impl NodeCoordinator {
    /// Starts connecting to the relay. Must be called from within a tokio runtime.
    pub fn new(config: &NodeConfiguration) -> (NodeCoordinator, NodeHandle) {
        log::info!("Starting node {}", config.name);
        let (transport, unsolicited) = TransportController::connect(config.relay_url.as_str());
        Self::with_transport(transport, unsolicited, Blockchain::new(config.hash_prefix.as_str()))
    }

    pub fn with_transport(
        transport: TransportController,
        unsolicited: UnsolicitedMessages,
        blockchain: Blockchain,
    ) -> (NodeCoordinator, NodeHandle) {
        let (commands_channel, commands_rcv) = mpsc::channel(COMMANDS_CHANNEL_SIZE);
        let (mined_tx, mined_rcv) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(NodeStatus::from(&blockchain));

        let coordinator = NodeCoordinator {
            blockchain,
            transport,
            unsolicited,
            commands_rcv,
            mined_tx,
            mined_rcv,
            status_tx,
        };
        let handle = NodeHandle {
            commands_channel,
            status,
        };
        (coordinator, handle)
    }

    pub async fn run(mut self, mut shutdown: Shutdown) -> anyhow::Result<()> {
        //Peers may ask for our chain while we wait for theirs, so the initial
        //request is polled together with everything else
        let transport = self.transport.clone();
        let longest_chain = transport.request_longest_chain();
        tokio::pin!(longest_chain);
        let mut initialized = false;

        loop {
            tokio::select! {
                result = &mut longest_chain, if !initialized => {
                    initialized = true;
                    self.initialize(result).await;
                }
                Some(message) = self.unsolicited.recv() => {
                    self.on_message(message).await;
                }
                Some(cmd) = self.commands_rcv.recv() => {
                    log::trace!("Node command: {cmd}");
                    self.on_command(cmd).await;
                }
                Some(mined) = self.mined_rcv.recv() => {
                    self.on_mined(mined).await;
                }
                _ = shutdown.recv() => {
                    log::info!("Shutting down node");
                    break;
                }
            }
            self.publish_status();
        }
        Ok(())
    }

    async fn initialize(&mut self, result: transport::Result<Vec<Block>>) {
        match result {
            Ok(chain) if !chain.is_empty() => {
                self.blockchain.initialize_with(chain);
                return;
            }
            Ok(_) => log::info!("No other nodes in the network, creating genesis block"),
            Err(err) => log::error!("Failed to get the longest chain, creating genesis block: {err}"),
        }
        if let Err(err) = self.blockchain.initialize_with_genesis_block().await {
            log::error!("Failed to create genesis block: {err}");
        }
    }

    async fn on_message(&mut self, message: Message) {
        let correlation_id = message.correlation_id;
        match message.body {
            MessageBody::GetLongestChainRequest => {
                let chain = self.blockchain.chain().to_vec();
                log::debug!("Sending chain of {} blocks for {correlation_id}", chain.len());
                if let Err(err) = self.transport.reply_with_chain(correlation_id, chain).await {
                    log::error!("Failed to send chain: {err}");
                }
            }
            MessageBody::NewBlockRequest(transactions) => {
                log::debug!("Peer asked to mine {} transactions", transactions.len());
                self.start_mining(transactions);
            }
            MessageBody::NewBlockAnnouncement(block) => {
                //Adopted blocks are not announced again
                self.extend_chain(block, false).await;
            }
            MessageBody::GetLongestChainResponse(_) => {
                log::debug!("Ignoring chain response {correlation_id} nobody waits for");
            }
        }
    }

    async fn on_command(&mut self, cmd: NodeCommand) {
        match cmd {
            NodeCommand::AddTransaction(transaction, reply) => {
                self.blockchain.add_transaction(transaction);
                let _ = reply.send(Ok(()));
            }
            NodeCommand::MineBlock(reply) => {
                let result = self.mine_pending_transactions().await;
                let _ = reply.send(result);
            }
            NodeCommand::GetChain(reply) => {
                let _ = reply.send(Ok(self.blockchain.chain().to_vec()));
            }
            NodeCommand::GetStatus(reply) => {
                let _ = reply.send(Ok(NodeStatus::from(&self.blockchain)));
            }
        }
    }

    async fn mine_pending_transactions(&mut self) -> Result<()> {
        if self.blockchain.chain_is_empty() {
            return Err(NodeError::NotInitialized);
        }
        if self.blockchain.no_pending_transactions() {
            return Err(NodeError::NoPendingTransactions);
        }

        let transactions = self.blockchain.pending_transactions().to_vec();
        if let Err(err) = self.transport.request_new_block(transactions.clone()).await {
            log::error!("Failed to ask peers for a new block: {err}");
        }
        self.start_mining(transactions);
        Ok(())
    }

    fn start_mining(&mut self, transactions: Vec<Transaction>) {
        match self.blockchain.start_mining(transactions) {
            Ok(job) => self.spawn_mining(job),
            Err(err) => log::warn!("Can't mine a block: {err}"),
        }
    }

    fn spawn_mining(&self, job: MiningJob) {
        let mined_tx = self.mined_tx.clone();
        tokio::spawn(async move {
            let result = Blockchain::run_job(job).await;
            //Receiver is gone only when the node stopped
            let _ = mined_tx.send(result);
        });
    }

    async fn on_mined(&mut self, mined: MinedBlock) {
        self.blockchain.finish_mining();
        match mined {
            Ok(block) => self.extend_chain(block, true).await,
            Err(err) => log::error!("{err}"),
        }
    }

    /// A block that doesn't extend the chain is dropped, the rejection is only logged.
    async fn extend_chain(&mut self, block: Block, announce: bool) {
        if let Err(err) = self.blockchain.add_block(block.clone()) {
            log::warn!("{err}");
            return;
        }
        if announce {
            if let Err(err) = self.transport.announce_new_block(block).await {
                log::error!("Failed to announce new block: {err}");
            }
        }
    }

    fn publish_status(&self) {
        let status = NodeStatus::from(&self.blockchain);
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            log::debug!("Node status: {status}");
            *current = status;
            true
        });
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use crate::core::ShutdownManager;

    use super::*;

    const PREFIX: &str = "0";

    fn unreachable_node() -> (NodeCoordinator, NodeHandle) {
        let (transport, unsolicited) = TransportController::connect("ws://127.0.0.1:1");
        NodeCoordinator::with_transport(transport, unsolicited, Blockchain::new(PREFIX))
    }

    async fn wait_for_chain(handle: &NodeHandle, length: usize) {
        let mut status = handle.subscribe_status();
        tokio::time::timeout(
            Duration::from_secs(10),
            status.wait_for(|status| status.chain_length >= length && !status.is_mining),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test]
    async fn test_falls_back_to_genesis_without_relay() {
        let shutdown = ShutdownManager::init();
        let (coordinator, handle) = unreachable_node();
        tokio::spawn(coordinator.run(shutdown.subscribe()));

        wait_for_chain(&handle, 1).await;

        let chain = handle.chain().await.unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].previous_hash, "0");
    }

    #[tokio::test]
    async fn test_mines_pending_transactions_locally() {
        let shutdown = ShutdownManager::init();
        let (coordinator, handle) = unreachable_node();
        tokio::spawn(coordinator.run(shutdown.subscribe()));
        wait_for_chain(&handle, 1).await;

        assert_matches!(
            handle.mine_block().await,
            Err(NodeError::NoPendingTransactions)
        );

        handle
            .add_transaction(Transaction::new("alice", "bob", 7))
            .await
            .unwrap();
        handle.mine_block().await.unwrap();
        wait_for_chain(&handle, 2).await;

        let chain = handle.chain().await.unwrap();
        assert_eq!(chain[1].transactions, vec![Transaction::new("alice", "bob", 7)]);
        let status = handle.status().await.unwrap();
        assert_eq!(status.pending_transactions, 0);
        assert_eq!(status.status_line, "Add one or more transactions.");
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let shutdown = ShutdownManager::init();
        let (coordinator, handle) = unreachable_node();
        let task = tokio::spawn(coordinator.run(shutdown.subscribe()));
        wait_for_chain(&handle, 1).await;

        shutdown.stop().await;

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_matches!(handle.chain().await, Err(NodeError::Stopped));
    }
}
