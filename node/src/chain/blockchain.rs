use crate::chain::{Block, ChainError, Result, Transaction, DEFAULT_HASH_PREFIX};
use crate::utilities::ChainTime;

/// Everything needed to mine a block away from the owner of the chain.
#[derive(Debug, Clone)]
pub struct MiningJob {
    previous_hash: String,
    timestamp: u64,
    transactions: Vec<Transaction>,
    hash_prefix: String,
}

impl MiningJob {
    pub fn run(self) -> Block {
        Block::mine(
            self.previous_hash,
            self.timestamp,
            self.transactions,
            &self.hash_prefix,
        )
    }
}

#[derive(Debug)]
pub struct Blockchain {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    /// Number of mining jobs started and not finished yet.
    mining_jobs: usize,
    hash_prefix: String,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_PREFIX)
    }
}

impl Blockchain {
    pub fn new<P: Into<String>>(hash_prefix: P) -> Self {
        Self {
            chain: vec![],
            pending_transactions: vec![],
            mining_jobs: 0,
            hash_prefix: hash_prefix.into(),
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn hash_prefix(&self) -> &str {
        &self.hash_prefix
    }

    pub fn chain_is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn is_mining(&self) -> bool {
        self.mining_jobs > 0
    }

    pub fn no_pending_transactions(&self) -> bool {
        self.pending_transactions.is_empty()
    }

    /// One line telling the user what the node is doing or waiting for.
    pub fn status_line(&self) -> &'static str {
        if self.chain_is_empty() {
            "Initializing the blockchain..."
        } else if self.is_mining() {
            "Mining a new block..."
        } else if self.no_pending_transactions() {
            "Add one or more transactions."
        } else {
            "Ready to mine a new block."
        }
    }

    pub fn add_transaction(&mut self, transaction: Transaction) {
        log::debug!("New pending transaction: {transaction}");
        self.pending_transactions.push(transaction);
    }

    /// Replaces the local chain with blocks received from the network.
    pub fn initialize_with(&mut self, blocks: Vec<Block>) {
        log::info!("Initializing chain with {} blocks", blocks.len());
        self.chain = blocks;
    }

    pub async fn initialize_with_genesis_block(&mut self) -> Result<()> {
        let job = MiningJob {
            previous_hash: "0".to_string(),
            timestamp: ChainTime::now(),
            transactions: vec![],
            hash_prefix: self.hash_prefix.clone(),
        };
        let genesis = Self::run_job(job).await?;
        log::info!("Initialized chain with genesis block {genesis}");
        self.chain = vec![genesis];
        Ok(())
    }

    /// Prepares a job mining `transactions` on top of the current tip and marks the
    /// chain as mining until [`Blockchain::finish_mining`] is called.
    pub fn start_mining(&mut self, transactions: Vec<Transaction>) -> Result<MiningJob> {
        let previous_hash = self
            .latest_block()
            .map(|block| block.hash.clone())
            .ok_or(ChainError::EmptyChain)?;
        self.mining_jobs += 1;
        Ok(MiningJob {
            previous_hash,
            timestamp: ChainTime::now(),
            transactions,
            hash_prefix: self.hash_prefix.clone(),
        })
    }

    pub fn finish_mining(&mut self) {
        self.mining_jobs = self.mining_jobs.saturating_sub(1);
    }

    pub async fn mine_block_with(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        let job = self.start_mining(transactions)?;
        let result = Self::run_job(job).await;
        self.finish_mining();
        result
    }

    pub(crate) async fn run_job(job: MiningJob) -> Result<Block> {
        tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|err| ChainError::Mining(err.to_string()))
    }

    /// Appends `block` if it extends the tip. On error the chain is left untouched.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        self.validate_block(&block)?;

        self.pending_transactions
            .retain(|tx| !block.transactions.contains(tx));
        log::info!("Added block {block}");
        self.chain.push(block);
        Ok(())
    }

    fn validate_block(&self, block: &Block) -> Result<()> {
        let previous_index = self
            .chain
            .iter()
            .position(|b| b.hash == block.previous_hash)
            .ok_or_else(|| ChainError::UnknownPredecessor(block.previous_hash.clone()))?;

        if previous_index + 1 < self.chain.len() {
            return Err(ChainError::LongerTailTakesPrecedence);
        }

        let hash = block.recalculate_hash();
        if hash != block.hash || !hash.starts_with(&self.hash_prefix) {
            return Err(ChainError::InvalidHash(block.hash.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;

    const PREFIX: &str = "0";

    #[tokio::test]
    async fn test_genesis_block() {
        let mut chain = Blockchain::new(PREFIX);
        assert!(chain.chain_is_empty());

        chain.initialize_with_genesis_block().await.unwrap();

        assert_eq!(chain.chain().len(), 1);
        assert_eq!(chain.latest_block().unwrap().previous_hash, "0");
    }

    #[tokio::test]
    async fn test_mine_and_add_block() {
        let mut chain = Blockchain::new(PREFIX);
        chain.initialize_with_genesis_block().await.unwrap();
        chain.add_transaction(Transaction::new("alice", "bob", 10));

        let transactions = chain.pending_transactions().to_vec();
        let block = chain.mine_block_with(transactions).await.unwrap();
        chain.add_block(block.clone()).unwrap();

        assert_eq!(chain.chain().len(), 2);
        assert_eq!(chain.latest_block(), Some(&block));
        assert!(chain.no_pending_transactions());
        assert!(!chain.is_mining());
    }

    #[tokio::test]
    async fn test_reject_block_with_wrong_predecessor() {
        let mut chain = Blockchain::new(PREFIX);
        chain.initialize_with_genesis_block().await.unwrap();

        let block = Block::mine("not-the-tip".into(), 1, vec![], PREFIX);

        assert_matches!(
            chain.add_block(block),
            Err(ChainError::UnknownPredecessor(_))
        );
        assert_eq!(chain.chain().len(), 1);
    }

    #[tokio::test]
    async fn test_reject_block_when_longer_tail_exists() {
        let mut chain = Blockchain::new(PREFIX);
        chain.initialize_with_genesis_block().await.unwrap();
        let genesis_hash = chain.latest_block().unwrap().hash.clone();

        let first = chain.mine_block_with(vec![]).await.unwrap();
        chain.add_block(first).unwrap();

        let competing = Block::mine(genesis_hash, 2, vec![], PREFIX);

        assert_matches!(
            chain.add_block(competing),
            Err(ChainError::LongerTailTakesPrecedence)
        );
        assert_eq!(chain.chain().len(), 2);
    }

    #[tokio::test]
    async fn test_reject_tampered_block() {
        let mut chain = Blockchain::new(PREFIX);
        chain.initialize_with_genesis_block().await.unwrap();

        let mut block = chain
            .mine_block_with(vec![Transaction::new("alice", "bob", 1)])
            .await
            .unwrap();
        block.transactions[0].amount = 1000;

        assert_matches!(chain.add_block(block), Err(ChainError::InvalidHash(_)));
        assert_eq!(chain.chain().len(), 1);
    }

    #[test]
    fn test_extend_adopted_chain_with_non_hex_tip() {
        crate::logging::init_with_directives("info");
        let mut chain = Blockchain::new(PREFIX);
        let tip = Block {
            hash: "aéééé".into(),
            nonce: 0,
            previous_hash: "0".into(),
            timestamp: 0,
            transactions: vec![],
        };
        chain.initialize_with(vec![tip]);

        let block = Block::mine("aéééé".into(), 1, vec![], PREFIX);
        chain.add_block(block).unwrap();

        assert_eq!(chain.chain().len(), 2);
    }

    #[test]
    fn test_start_mining_on_empty_chain() {
        let mut chain = Blockchain::new(PREFIX);

        assert_matches!(chain.start_mining(vec![]), Err(ChainError::EmptyChain));
        assert!(!chain.is_mining());
    }

    #[test]
    fn test_status_line() {
        let mut chain = Blockchain::new(PREFIX);
        assert_eq!(chain.status_line(), "Initializing the blockchain...");

        chain.initialize_with(vec![Block::mine("0".into(), 0, vec![], PREFIX)]);
        assert_eq!(chain.status_line(), "Add one or more transactions.");

        chain.add_transaction(Transaction::new("alice", "bob", 3));
        assert_eq!(chain.status_line(), "Ready to mine a new block.");

        let _job = chain.start_mining(vec![]).unwrap();
        assert_eq!(chain.status_line(), "Mining a new block...");
    }

    #[test]
    fn test_mining_flag_counts_jobs() {
        let mut chain = Blockchain::new(PREFIX);
        chain.initialize_with(vec![Block::mine("0".into(), 0, vec![], PREFIX)]);

        let _first = chain.start_mining(vec![]).unwrap();
        let _second = chain.start_mining(vec![]).unwrap();
        chain.finish_mining();
        assert!(chain.is_mining());

        chain.finish_mining();
        assert!(!chain.is_mining());
    }
}
