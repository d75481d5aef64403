//! The peer set: the listener, outbound connections, per-connection read
//! and write tasks, and the shared inbound queue the dispatcher consumes.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ferrite_consensus::ChainState;
use tokio_util::codec::Framed;

use crate::constants::PROTOCOL_VERSION;
use crate::error::PeerError;
use crate::protocol::{codec::Codec, message::Message};

/// How long the version/verack exchange may take before the connection is
/// abandoned.
const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Identifies one live peer connection.
pub type PeerId = u64;

/// Events surfaced to the dispatcher.
#[derive(Debug)]
pub enum PeerEvent {
    /// The handshake completed and the peer is ready for traffic.
    Connected {
        /// The new peer.
        peer: PeerId,
        /// The best-chain height the peer advertised.
        best_height: u32,
    },
    /// The peer sent a message.
    Message {
        /// The sending peer.
        peer: PeerId,
        /// Its message.
        message: Message,
    },
    /// The connection closed; in-flight requests to this peer are dead.
    Disconnected {
        /// The departed peer.
        peer: PeerId,
    },
}

struct PeerHandle {
    addr: SocketAddr,
    outbox: mpsc::UnboundedSender<Message>,
}

struct Inner {
    peers: Mutex<HashMap<PeerId, PeerHandle>>,
    events: mpsc::UnboundedSender<PeerEvent>,
    /// Hashes already processed or relayed; duplicate delivery in either
    /// direction short-circuits here.
    seen: Mutex<HashSet<[u8; 32]>>,
    next_id: AtomicU64,
    nonce: u64,
    chain: ChainState,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheaply clonable handle to every live connection.
#[derive(Clone)]
pub struct PeerSet {
    inner: Arc<Inner>,
}

impl PeerSet {
    /// Create an empty peer set and the event queue its connections feed.
    pub fn new(chain: ChainState) -> (PeerSet, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let set = PeerSet {
            inner: Arc::new(Inner {
                peers: Mutex::new(HashMap::new()),
                events,
                seen: Mutex::new(HashSet::new()),
                next_id: AtomicU64::new(1),
                nonce: rand::random(),
                chain,
                tasks: Mutex::new(Vec::new()),
            }),
        };
        (set, receiver)
    }

    /// Bind the listener and start accepting inbound connections.
    /// Returns the bound address (useful when listening on port 0).
    pub async fn listen(&self, addr: SocketAddr) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening for peers");

        let set = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!(%addr, "inbound connection");
                        set.start_connection(stream, addr);
                    }
                    Err(err) => {
                        warn!(%err, "accept failed, stopping listener");
                        break;
                    }
                }
            }
        });
        self.track(handle);
        Ok(local_addr)
    }

    /// Dial an outbound peer.
    pub fn connect(&self, addr: SocketAddr) {
        let set = self.clone();
        let handle = tokio::spawn(async move {
            match TcpStream::connect(addr).await {
                Ok(stream) => set.start_connection(stream, addr),
                Err(err) => warn!(%addr, %err, "outbound connect failed"),
            }
        });
        self.track(handle);
    }

    /// Queue a message to one peer. Silently dropped if the peer is gone.
    pub fn send(&self, peer: PeerId, message: Message) {
        if let Some(handle) = self.registry().get(&peer) {
            let _ = handle.outbox.send(message);
        }
    }

    /// Queue a message to every peer except `except`.
    pub fn broadcast(&self, message: Message, except: Option<PeerId>) {
        for (id, handle) in self.registry().iter() {
            if Some(*id) == except {
                continue;
            }
            let _ = handle.outbox.send(message.clone());
        }
    }

    /// Record a hash as seen. Returns `true` the first time; callers use
    /// this to relay and process each object at most once.
    pub fn mark_seen(&self, hash: [u8; 32]) -> bool {
        self.inner
            .seen
            .lock()
            .expect("seen set lock poisoned")
            .insert(hash)
    }

    /// Whether a hash was already seen.
    pub fn is_seen(&self, hash: &[u8; 32]) -> bool {
        self.inner
            .seen
            .lock()
            .expect("seen set lock poisoned")
            .contains(hash)
    }

    /// The number of live peers.
    pub fn peer_count(&self) -> usize {
        self.registry().len()
    }

    /// The remote addresses of every live peer.
    pub fn peer_addresses(&self) -> Vec<(PeerId, SocketAddr)> {
        self.registry()
            .iter()
            .map(|(id, handle)| (*id, handle.addr))
            .collect()
    }

    /// Close every connection and stop the listener. Peer write tasks end
    /// when their outbox senders drop; read tasks end when sockets close.
    pub fn shutdown(&self) {
        info!("shutting down peer set");
        self.registry().clear();
        for task in self
            .inner
            .tasks
            .lock()
            .expect("task list lock poisoned")
            .drain(..)
        {
            task.abort();
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<PeerId, PeerHandle>> {
        self.inner.peers.lock().expect("peer registry lock poisoned")
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.inner
            .tasks
            .lock()
            .expect("task list lock poisoned")
            .push(handle);
    }

    /// Symmetric handshake: both sides open with a version, each
    /// acknowledges the other's. Returns the peer's advertised height.
    async fn handshake(
        framed: &mut Framed<TcpStream, Codec>,
        local_nonce: u64,
        local_height: u32,
    ) -> Result<u32, PeerError> {
        framed
            .send(Message::Version {
                version: PROTOCOL_VERSION,
                best_height: local_height,
                nonce: local_nonce,
            })
            .await?;

        let mut best_height = None;
        let mut acked = false;
        while best_height.is_none() || !acked {
            let message = framed.next().await.ok_or(PeerError::HandshakeFailed)??;
            match message {
                Message::Version {
                    nonce,
                    best_height: peer_height,
                    ..
                } => {
                    if nonce == local_nonce {
                        return Err(PeerError::SelfConnection);
                    }
                    framed.send(Message::Verack).await?;
                    best_height = Some(peer_height);
                }
                Message::Verack => acked = true,
                _ => return Err(PeerError::HandshakeFailed),
            }
        }
        Ok(best_height.expect("the loop exits holding a version"))
    }

    fn start_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let set = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = set.run_connection(stream, addr).await {
                debug!(%addr, %err, "connection ended");
            }
        });
        self.track(handle);
    }

    async fn run_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<(), PeerError> {
        let mut framed = Framed::new(stream, Codec::new());

        let local_height = self.inner.chain.tip_height().map(|h| h.0).unwrap_or(0);
        let best_height = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            Self::handshake(&mut framed, self.inner.nonce, local_height),
        )
        .await
        .map_err(|_| PeerError::Timeout)??;

        let peer = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (outbox, mut outbox_rx) = mpsc::unbounded_channel();
        self.registry().insert(peer, PeerHandle { addr, outbox });
        info!(peer, %addr, best_height, "peer connected");
        let _ = self
            .inner
            .events
            .send(PeerEvent::Connected { peer, best_height });

        let (mut sink, mut stream) = framed.split();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbox_rx.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        while let Some(message) = stream.next().await {
            match message {
                Ok(message) => {
                    let _ = self.inner.events.send(PeerEvent::Message { peer, message });
                }
                Err(err) => {
                    // Malformed input from an untrusted peer is recovered
                    // at the connection boundary: drop the connection,
                    // keep the node.
                    warn!(peer, %err, "dropping misbehaving connection");
                    break;
                }
            }
        }

        writer.abort();
        self.registry().remove(&peer);
        info!(peer, %addr, "peer disconnected");
        let _ = self.inner.events.send(PeerEvent::Disconnected { peer });
        Ok(())
    }
}
