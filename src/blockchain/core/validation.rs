use crate::blockchain::core::chain::{Block, Ledger};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Stored hash differs from the digest of the block's own fields.
    HashMismatch,
    /// `previous_hash` does not equal the prior block's hash.
    BrokenLink,
}

/// First inconsistency found while scanning a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainFault {
    pub index: usize,
    pub kind: FaultKind,
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            FaultKind::HashMismatch => write!(f, "Invalid block hash at block {}", self.index),
            FaultKind::BrokenLink => write!(f, "Invalid previous hash at block {}", self.index),
        }
    }
}

fn check_block(block: &Block, previous: &Block) -> Option<FaultKind> {
    if block.hash != block.calculate_hash() {
        return Some(FaultKind::HashMismatch);
    }
    if block.previous_hash != previous.hash {
        return Some(FaultKind::BrokenLink);
    }
    None
}

/// Scans from index 1 and reports the first block whose hash or link is
/// inconsistent.
pub fn first_invalid(blocks: &[Block]) -> Option<ChainFault> {
    blocks
        .windows(2)
        .enumerate()
        .find_map(|(i, pair)| {
            check_block(&pair[1], &pair[0]).map(|kind| ChainFault { index: i + 1, kind })
        })
}

impl Ledger {
    pub fn first_invalid(&self) -> Option<ChainFault> {
        first_invalid(self.blocks())
    }

    pub fn validate(&self) -> bool {
        match self.first_invalid() {
            Some(fault) => {
                tracing::warn!(index = fault.index, "{}", fault);
                false
            }
            None => true,
        }
    }
}
