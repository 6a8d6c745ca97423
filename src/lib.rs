//! LinkChain - a hash-linked ledger node that propagates new blocks to peers
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Ledger
//! - [`blockchain`] - Block structure, append path and chain validation
//! - [`crypto`] - SHA-256 digests over the canonical block encoding
//!
//! ## Networking
//! - [`network`] - Peer connection registry and per-peer reader tasks
//! - [`protocol`] - Block announcement messages, framing and ingestion
//!
//! ## Node
//! - [`node`] - Composition root wiring ledger, registry and protocol
//! - `api` - HTTP surface (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger
// ============================================================================
pub mod blockchain;
pub mod crypto;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod protocol;

// ============================================================================
// Node
// ============================================================================
pub mod node;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
