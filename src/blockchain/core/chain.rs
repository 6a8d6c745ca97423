use crate::crypto::block_digest;
use crate::error::ChainError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Payload of the network-wide genesis block.
pub const GENESIS_DATA: &str = "Genesis Block";
/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0xGENESIS";
/// Fixed genesis timestamp (2023-01-01T00:00:00Z) so every node derives the
/// same genesis hash.
pub const GENESIS_TIMESTAMP: i64 = 1_672_531_200;

static GENESIS_BLOCK: Lazy<Block> =
    Lazy::new(|| Block::new(GENESIS_TIMESTAMP, GENESIS_DATA, GENESIS_PREVIOUS_HASH));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub timestamp: i64,
    pub data: String,
    pub previous_hash: String,
    pub hash: String,
}

impl Block {
    /// Builds a block and seals it with the digest of its own fields.
    pub fn new(timestamp: i64, data: impl Into<String>, previous_hash: impl Into<String>) -> Self {
        let data = data.into();
        let previous_hash = previous_hash.into();
        let hash = block_digest(timestamp, &data, &previous_hash);
        Block {
            timestamp,
            data,
            previous_hash,
            hash,
        }
    }

    pub fn genesis() -> Self {
        GENESIS_BLOCK.clone()
    }

    /// Recomputes the digest from the stored fields.
    pub fn calculate_hash(&self) -> String {
        block_digest(self.timestamp, &self.data, &self.previous_hash)
    }
}

/// Append-only, hash-linked sequence of blocks. Index 0 is always genesis.
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            blocks: vec![Block::genesis()],
        }
    }

    /// Appends `data` chained to the current tail, stamped with the wall clock.
    pub fn append(&mut self, data: impl Into<String>) -> Block {
        self.append_with_timestamp(data, chrono::Utc::now().timestamp())
    }

    pub fn append_with_timestamp(&mut self, data: impl Into<String>, timestamp: i64) -> Block {
        let block = Block::new(timestamp, data, self.tail().hash.clone());
        self.blocks.push(block.clone());
        tracing::debug!(height = self.blocks.len() - 1, hash = %block.hash, "ledger.append");
        block
    }

    /// Most recent block; genesis while nothing has been appended.
    pub fn tail(&self) -> &Block {
        self.blocks.last().unwrap_or(&*GENESIS_BLOCK)
    }

    pub fn at(&self, index: usize) -> Result<&Block, ChainError> {
        self.blocks.get(index).ok_or(ChainError::OutOfRange {
            index: i64::try_from(index).unwrap_or(i64::MAX),
            len: self.blocks.len(),
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a ledger holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_is_fixed() {
        let a = Ledger::new();
        let b = Ledger::new();
        assert_eq!(a.len(), 1);
        assert_eq!(a.tail(), b.tail());
        assert_eq!(a.tail().data, GENESIS_DATA);
        assert_eq!(a.tail().previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(a.tail().timestamp, GENESIS_TIMESTAMP);
        assert_eq!(a.tail().hash, a.tail().calculate_hash());
    }

    #[test]
    fn test_append_links_to_tail() {
        let mut ledger = Ledger::new();
        let a = ledger.append("A");
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.tail().data, "A");
        assert_eq!(a.previous_hash, Block::genesis().hash);

        let b = ledger.append("B");
        assert_eq!(ledger.len(), 3);
        assert_eq!(b.previous_hash, a.hash);
        assert_eq!(ledger.tail().previous_hash, ledger.at(1).unwrap().hash);
    }

    #[test]
    fn test_append_accepts_empty_payload() {
        let mut ledger = Ledger::new();
        let block = ledger.append("");
        assert_eq!(block.data, "");
        assert_eq!(block.hash, block.calculate_hash());
    }

    #[test]
    fn test_every_block_hash_matches_its_fields() {
        let mut ledger = Ledger::new();
        for payload in ["one", "two", "three", "four"] {
            ledger.append(payload);
        }
        for (i, block) in ledger.blocks().iter().enumerate().skip(1) {
            assert_eq!(block.hash, block_digest(block.timestamp, &block.data, &block.previous_hash));
            assert_eq!(block.previous_hash, ledger.blocks()[i - 1].hash);
        }
    }

    #[test]
    fn test_at_bounds() {
        let mut ledger = Ledger::new();
        let a = ledger.append("A");
        assert_eq!(ledger.at(1).unwrap(), &a);
        assert_eq!(ledger.at(0).unwrap(), &Block::genesis());
        assert_eq!(
            ledger.at(2),
            Err(ChainError::OutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn test_same_payloads_same_order_give_identical_chains() {
        let mut a = Ledger::new();
        let mut b = Ledger::new();
        for (ts, payload) in [(100, "x"), (101, "y"), (102, "z")] {
            a.append_with_timestamp(payload, ts);
            b.append_with_timestamp(payload, ts);
        }
        assert_eq!(a.blocks(), b.blocks());
    }

    #[test]
    fn test_different_order_diverges() {
        let mut a = Ledger::new();
        let mut b = Ledger::new();
        a.append_with_timestamp("x", 100);
        a.append_with_timestamp("y", 100);
        b.append_with_timestamp("y", 100);
        b.append_with_timestamp("x", 100);
        assert_ne!(a.tail().hash, b.tail().hash);
    }

    #[test]
    fn test_block_serializes_with_camel_case_fields() {
        let json = serde_json::to_value(Block::genesis()).unwrap();
        assert_eq!(json["data"], GENESIS_DATA);
        assert_eq!(json["previousHash"], GENESIS_PREVIOUS_HASH);
        assert_eq!(json["timestamp"], GENESIS_TIMESTAMP);
        assert!(json["hash"].is_string());
    }
}
