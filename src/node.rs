//! Node assembly for LinkChain
//!
//! Wires one ledger to a connection registry through the propagation
//! protocol, runs the peer listener, and is the single entry point for
//! local appends.

use crate::blockchain::{Block, Ledger};
use crate::config::Config;
use crate::error::{ChainError, Result};
use crate::network::{ConnectionRegistry, DEFAULT_DIAL_TIMEOUT, DEFAULT_WRITE_TIMEOUT};
use crate::protocol::codec::{check_frame, Framing};
use crate::protocol::{Message, Propagator};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Capacity of the queue between peer reader tasks and the ingest loop.
const INBOUND_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Ready,
    Stopped,
}

/// Plain values the node needs; see [`Config`] for where they come from.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub framing: Framing,
    pub dial_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl From<&Config> for NodeSettings {
    fn from(config: &Config) -> Self {
        Self {
            framing: config.framing,
            dial_timeout: Duration::from_millis(config.dial_timeout_ms),
            write_timeout: Duration::from_millis(config.write_timeout_ms),
        }
    }
}

/// Composition root: one ledger, one connection registry and the
/// propagation protocol joining them. The node holds the only write path
/// into its ledger.
pub struct Node {
    ledger: Arc<RwLock<Ledger>>,
    registry: Arc<ConnectionRegistry>,
    protocol: Arc<Propagator>,
    state: Arc<RwLock<NodeState>>,
    /// Serialises local append+announce so peers see local blocks in
    /// ledger order.
    local_writes: Mutex<()>,
    cancel: CancellationToken,
}

impl Node {
    /// Builds the node and spawns its ingest loop. Must be called from
    /// within a tokio runtime.
    pub fn new(settings: NodeSettings) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);
        let ledger = Arc::new(RwLock::new(Ledger::new()));
        let registry = Arc::new(
            ConnectionRegistry::new(settings.framing, inbound_tx)
                .with_timeouts(settings.dial_timeout, settings.write_timeout),
        );
        let protocol = Arc::new(Propagator::new(ledger.clone(), registry.clone()));
        let cancel = CancellationToken::new();

        tokio::spawn(protocol.clone().run(inbound_rx, cancel.child_token()));

        Arc::new(Self {
            ledger,
            registry,
            protocol,
            state: Arc::new(RwLock::new(NodeState::Booting)),
            local_writes: Mutex::new(()),
            cancel,
        })
    }

    /// Binds `address` and starts accepting peers. A bind failure is
    /// returned as [`ChainError::Bind`] and should be treated as fatal.
    pub async fn listen(&self, address: &str) -> Result<SocketAddr> {
        let listener = TcpListener::bind(address).await.map_err(|e| ChainError::Bind {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        let local = listener.local_addr()?;
        info!("Node is listening on {}", local);

        let registry = self.registry.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, remote)) => {
                            info!(peer = %remote, "Accepted inbound peer");
                            registry.accept(stream).await;
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    },
                }
            }
            info!("Listener on {} stopped", local);
        });

        *self.state.write().await = NodeState::Ready;
        Ok(local)
    }

    pub async fn connect_to_peer(&self, address: &str) -> Result<()> {
        match self.registry.connect(address).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Failed to connect to peer: {}", e);
                Err(e)
            }
        }
    }

    /// Appends `payload` locally and announces the new block to every peer.
    /// Payloads the configured framing cannot carry are refused before the
    /// ledger is touched.
    pub async fn append_and_broadcast(&self, payload: impl Into<String>) -> Result<Block> {
        let payload = payload.into();
        check_frame(self.registry.framing(), &Message::Block(payload.clone()).encode())?;

        let _guard = self.local_writes.lock().await;
        let block = self.ledger.write().await.append(payload);
        info!(hash = %block.hash, "New block added");
        self.protocol.announce(&block).await?;
        Ok(block)
    }

    pub async fn blocks(&self) -> Vec<Block> {
        self.ledger.read().await.blocks().to_vec()
    }

    /// Block at `index`; negative or past-the-end indices are
    /// [`ChainError::OutOfRange`].
    pub async fn block_at(&self, index: i64) -> Result<Block> {
        let ledger = self.ledger.read().await;
        usize::try_from(index)
            .ok()
            .and_then(|i| ledger.at(i).ok())
            .cloned()
            .ok_or(ChainError::OutOfRange {
                index,
                len: ledger.len(),
            })
    }

    pub async fn tail(&self) -> Block {
        self.ledger.read().await.tail().clone()
    }

    pub async fn len(&self) -> usize {
        self.ledger.read().await.len()
    }

    /// Always false: the ledger starts with its genesis block.
    pub async fn is_empty(&self) -> bool {
        self.ledger.read().await.is_empty()
    }

    pub async fn validate(&self) -> bool {
        self.ledger.read().await.validate()
    }

    pub async fn peers(&self) -> Vec<String> {
        self.registry.peers().await
    }

    pub async fn state(&self) -> NodeState {
        *self.state.read().await
    }

    /// Stops the listener and ingest loop and closes every peer connection.
    pub async fn shutdown(&self) {
        *self.state.write().await = NodeState::Stopped;
        self.cancel.cancel();
        self.registry.shutdown().await;
        info!("Node stopped");
    }
}
