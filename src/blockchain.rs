// Thin re-export module: implementation is in `blockchain/core.rs` so the
// ledger's chain structure and its validation can evolve separately.

pub mod core;
pub use self::core::*;
