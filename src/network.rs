//! Peer connection registry for LinkChain
//!
//! Owns every live peer stream, keyed by remote address. Each registered peer
//! gets a reader task that decodes frames off the stream and forwards them to
//! the protocol layer over an mpsc channel. A frame that is not UTF-8 is
//! discarded and the connection kept. A peer is dropped from the registry,
//! and its stream closed, as soon as a read or write on it fails.

use crate::error::{ChainError, Result};
use crate::protocol::codec::{check_frame, Frame, FramingError, Framing, PeerCodec};
use futures::future::join_all;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_ANONYMOUS_PEER: AtomicU64 = AtomicU64::new(0);

/// A decoded frame together with the address of the peer that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub from: String,
    pub line: String,
}

type PeerWriter = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, PeerCodec>;

/// A live connection to another node.
pub struct Peer {
    address: String,
    writer: Mutex<PeerWriter>,
    cancel: CancellationToken,
}

impl Peer {
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn send(&self, frame: String) -> std::result::Result<(), FramingError> {
        self.writer.lock().await.send(frame).await
    }

    /// Stops the reader task and shuts down the write side of the stream.
    async fn close(&self, within: Duration) {
        self.cancel.cancel();
        let mut writer = self.writer.lock().await;
        let _ = tokio::time::timeout(within, SinkExt::<String>::close(&mut *writer)).await;
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer").field("address", &self.address).finish()
    }
}

pub struct ConnectionRegistry {
    peers: RwLock<HashMap<String, Arc<Peer>>>,
    inbound: mpsc::Sender<InboundFrame>,
    framing: Framing,
    dial_timeout: Duration,
    write_timeout: Duration,
    cancel: CancellationToken,
}

impl ConnectionRegistry {
    /// Frames read from any peer are forwarded to `inbound`.
    pub fn new(framing: Framing, inbound: mpsc::Sender<InboundFrame>) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            inbound,
            framing,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeouts(mut self, dial_timeout: Duration, write_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self.write_timeout = write_timeout;
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Dials `address` and registers the resulting stream. Nothing is
    /// registered if the dial fails or times out.
    pub async fn connect(self: &Arc<Self>, address: &str) -> Result<Arc<Peer>> {
        let stream = match tokio::time::timeout(self.dial_timeout, TcpStream::connect(address)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ChainError::Connection {
                    address: address.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ChainError::Connection {
                    address: address.to_string(),
                    reason: format!("dial timed out after {:?}", self.dial_timeout),
                })
            }
        };
        let _ = stream.set_nodelay(true);

        info!(peer = %address, "Connected to peer");
        Ok(self.attach(address.to_string(), stream).await)
    }

    /// Registers a stream accepted by the listening socket, keyed by its
    /// remote address.
    pub async fn accept(self: &Arc<Self>, stream: TcpStream) -> Arc<Peer> {
        let address = match stream.peer_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => format!(
                "inbound-{}",
                NEXT_ANONYMOUS_PEER.fetch_add(1, Ordering::Relaxed)
            ),
        };
        let _ = stream.set_nodelay(true);
        self.attach(address, stream).await
    }

    /// Registers any byte stream under `address` and starts its reader task.
    /// An existing peer with the same address is replaced and closed.
    pub async fn attach<S>(self: &Arc<Self>, address: String, stream: S) -> Arc<Peer>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let reader = FramedRead::new(read_half, PeerCodec::new(self.framing));
        let write_half: Box<dyn AsyncWrite + Send + Unpin> = Box::new(write_half);
        let writer: PeerWriter = FramedWrite::new(write_half, PeerCodec::new(self.framing));

        let peer = Arc::new(Peer {
            address: address.clone(),
            writer: Mutex::new(writer),
            cancel: self.cancel.child_token(),
        });

        let replaced = self.peers.write().await.insert(address.clone(), peer.clone());
        if let Some(old) = replaced {
            debug!(peer = %address, "Replacing existing connection");
            old.close(self.write_timeout).await;
        }

        let registry = Arc::clone(self);
        let reader_peer = Arc::clone(&peer);
        tokio::spawn(async move { registry.read_loop(reader_peer, reader).await });

        peer
    }

    async fn read_loop<R>(self: Arc<Self>, peer: Arc<Peer>, mut reader: FramedRead<R, PeerCodec>)
    where
        R: AsyncRead + Unpin,
    {
        loop {
            tokio::select! {
                _ = peer.cancel.cancelled() => break,
                next = reader.next() => match next {
                    Some(Ok(Frame::Undecodable(body))) => {
                        warn!(peer = %peer.address, bytes = body.len(), "Discarding non-UTF-8 message from peer");
                    }
                    Some(Ok(Frame::Text(line))) => {
                        debug!(peer = %peer.address, %line, "Received message from peer");
                        let frame = InboundFrame { from: peer.address.clone(), line };
                        if self.inbound.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(peer = %peer.address, error = %e, "Dropping peer after read error");
                        break;
                    }
                    None => {
                        info!(peer = %peer.address, "Connection closed with peer");
                        break;
                    }
                },
            }
        }
        self.remove_if_current(&peer).await;
    }

    /// Removes `peer` unless its address has since been taken over by a
    /// newer connection.
    async fn remove_if_current(&self, peer: &Arc<Peer>) {
        let removed = {
            let mut peers = self.peers.write().await;
            match peers.get(&peer.address) {
                Some(current) if Arc::ptr_eq(current, peer) => peers.remove(&peer.address),
                _ => None,
            }
        };
        if removed.is_some() {
            debug!(peer = %peer.address, "Peer removed from registry");
        }
        peer.close(self.write_timeout).await;
    }

    /// Closes and removes the peer at `address`. No-op if absent.
    pub async fn disconnect(&self, address: &str) {
        let removed = self.peers.write().await.remove(address);
        if let Some(peer) = removed {
            peer.close(self.write_timeout).await;
            info!(peer = %address, "Disconnected peer");
        }
    }

    /// Writes `frame` to every registered peer concurrently, each write
    /// bounded by the write timeout. Peers whose write fails are dropped;
    /// the others still receive the frame. Returns how many peers accepted
    /// it. Fails only if `frame` cannot be encoded under the current framing.
    pub async fn broadcast(&self, frame: &str) -> Result<usize> {
        check_frame(self.framing, frame)?;

        let peers: Vec<Arc<Peer>> = self.peers.read().await.values().cloned().collect();
        let sends = peers.iter().map(|peer| {
            let frame = frame.to_string();
            async move {
                let outcome = match tokio::time::timeout(self.write_timeout, peer.send(frame)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("write timed out after {:?}", self.write_timeout)),
                };
                (peer, outcome)
            }
        });

        let mut delivered = 0;
        for (peer, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => delivered += 1,
                Err(reason) => {
                    warn!(peer = %peer.address, %reason, "Failed to send message to peer");
                    self.remove_if_current(peer).await;
                }
            }
        }
        Ok(delivered)
    }

    /// Addresses of all registered peers, sorted.
    pub async fn peers(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.peers.read().await.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Cancels every reader task and closes every connection.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let drained: Vec<Arc<Peer>> = self.peers.write().await.drain().map(|(_, p)| p).collect();
        for peer in drained {
            peer.close(self.write_timeout).await;
        }
    }
}
