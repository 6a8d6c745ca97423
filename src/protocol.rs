//! Block propagation protocol
//!
//! One message type exists: a block announcement, `BLOCK <payload>`. A node
//! that receives one appends the payload to its own ledger, computing its
//! own link to its own tail, and does not forward it any further. There is
//! no acknowledgment, retry or ordering guarantee across peers.

pub mod codec;

pub use codec::{Frame, Framing, FramingError, PeerCodec};

use crate::blockchain::{Block, Ledger};
use crate::error::{ChainError, Result};
use crate::network::{ConnectionRegistry, InboundFrame};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const BLOCK_PREFIX: &str = "BLOCK ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Block(String),
}

impl Message {
    pub fn parse(line: &str) -> Result<Message> {
        match line.strip_prefix(BLOCK_PREFIX) {
            Some(payload) => Ok(Message::Block(payload.to_string())),
            None => Err(ChainError::MalformedMessage(line.to_string())),
        }
    }

    /// Wire text of the message, without framing.
    pub fn encode(&self) -> String {
        match self {
            Message::Block(payload) => format!("{}{}", BLOCK_PREFIX, payload),
        }
    }
}

impl From<&Block> for Message {
    fn from(block: &Block) -> Self {
        Message::Block(block.data.clone())
    }
}

pub struct Propagator {
    ledger: Arc<RwLock<Ledger>>,
    registry: Arc<ConnectionRegistry>,
}

impl Propagator {
    pub fn new(ledger: Arc<RwLock<Ledger>>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { ledger, registry }
    }

    /// Sends a block announcement to every connected peer and returns how
    /// many peers accepted it.
    pub async fn announce(&self, block: &Block) -> Result<usize> {
        let delivered = self.registry.broadcast(&Message::from(block).encode()).await?;
        info!(hash = %block.hash, peers = delivered, "Broadcasted block");
        Ok(delivered)
    }

    /// Applies one inbound frame to the local ledger. Announced payloads are
    /// re-chained locally; the sender's hashes are never adopted.
    pub async fn ingest(&self, frame: &InboundFrame) -> Result<Block> {
        match Message::parse(&frame.line)? {
            Message::Block(payload) => {
                let block = self.ledger.write().await.append(payload);
                info!(peer = %frame.from, hash = %block.hash, "New block added from peer");
                Ok(block)
            }
        }
    }

    /// Drains `inbound` until the channel closes or `cancel` fires.
    /// Malformed frames are logged and dropped; the sending connection
    /// stays open.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<InboundFrame>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = inbound.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = self.ingest(&frame).await {
                            warn!(peer = %frame.from, error = %e, "Unknown message type received");
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("Propagation ingest loop stopped");
    }
}
