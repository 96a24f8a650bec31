use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::utilities::{blake2_256, to_hex};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
}

impl Transaction {
    pub fn new<S: Into<String>, R: Into<String>>(sender: S, recipient: R, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }
}

impl Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}: {}", self.sender, self.recipient, self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub hash: String,
    pub nonce: u64,
    pub previous_hash: String,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hex encoded blake2b-256 over everything in the block except its own hash.
    pub fn calculate_hash(
        previous_hash: &str,
        timestamp: u64,
        transactions: &[Transaction],
        nonce: u64,
    ) -> String {
        let mut data = format!("{previous_hash}{timestamp}");
        for tx in transactions {
            data.push_str(&format!("{}{}{}", tx.sender, tx.recipient, tx.amount));
        }
        data.push_str(&nonce.to_string());
        to_hex(blake2_256(data.as_bytes()))
    }

    /// Searches nonces until the hash starts with `hash_prefix`.
    ///
    /// This can run for a long time, call it from a blocking context.
    pub fn mine(
        previous_hash: String,
        timestamp: u64,
        transactions: Vec<Transaction>,
        hash_prefix: &str,
    ) -> Block {
        let mut nonce = 0;
        loop {
            let hash = Self::calculate_hash(&previous_hash, timestamp, &transactions, nonce);
            if hash.starts_with(hash_prefix) {
                return Block {
                    hash,
                    nonce,
                    previous_hash,
                    timestamp,
                    transactions,
                };
            }
            nonce += 1;
        }
    }

    pub fn recalculate_hash(&self) -> String {
        Self::calculate_hash(
            &self.previous_hash,
            self.timestamp,
            &self.transactions,
            self.nonce,
        )
    }

    pub fn short_hash(&self) -> &str {
        shorten(&self.hash)
    }
}

/// First 8 characters. Hashes received from peers are not necessarily hex.
fn shorten(hash: &str) -> &str {
    match hash.char_indices().nth(8) {
        Some((end, _)) => &hash[..end],
        None => hash,
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hash: {}, previous: {}, timestamp: {}, nr of transactions: {}",
            self.short_hash(),
            shorten(&self.previous_hash),
            self.timestamp,
            self.transactions.len()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mined_block_meets_prefix() {
        let block = Block::mine("0".into(), 1, vec![Transaction::new("a", "b", 1)], "00");

        assert!(block.hash.starts_with("00"));
        assert_eq!(block.recalculate_hash(), block.hash);
    }

    #[test]
    fn test_hash_depends_on_transactions() {
        let first = Block::calculate_hash("0", 1, &[Transaction::new("a", "b", 1)], 0);
        let second = Block::calculate_hash("0", 1, &[Transaction::new("a", "b", 2)], 0);

        assert_ne!(first, second);
    }

    #[test]
    fn test_block_json_field_names() {
        let block = Block {
            hash: "00ab".into(),
            nonce: 7,
            previous_hash: "0".into(),
            timestamp: 42,
            transactions: vec![],
        };

        let json = serde_json::to_value(&block).unwrap();

        assert_eq!(json["previousHash"], "0");
        assert_eq!(json["nonce"], 7);
    }

    #[test]
    fn test_display_with_non_ascii_hashes() {
        let block = Block {
            hash: "aéééééééé".into(),
            nonce: 0,
            previous_hash: "bééééééé".into(),
            timestamp: 1,
            transactions: vec![],
        };

        assert_eq!(block.short_hash(), "aééééééé");
        assert_eq!(
            block.to_string(),
            "hash: aééééééé, previous: bééééééé, timestamp: 1, nr of transactions: 0"
        );
    }
}
