//! Initial block download.
//!
//! When a peer advertises more work than we hold, the coordinator sends a
//! GETBLOCKS carrying a locator, fetches the advertised blocks, and
//! connects them in height order. Blocks that arrive before their parent
//! are buffered by parent hash and flushed as soon as the parent connects.
//! A request that makes no progress for thirty seconds is re-issued with a
//! fresh locator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use ferrite_chain::block::{self, Block};
use ferrite_consensus::{ChainError, ChainState};

use crate::constants::IBD_STALE_TIMEOUT;
use crate::peer::{PeerId, PeerSet};
use crate::protocol::{get_blocks::GetBlocks, message::Message};

/// The sync state machine: Idle -> Requesting -> Downloading -> Idle.
#[derive(Copy, Clone, Debug)]
enum Phase {
    /// Not syncing; every connected peer is at or below our height.
    Idle,
    /// A GETBLOCKS went out; waiting for the peer's inventory.
    Requesting { peer: PeerId, since: Instant },
    /// The peer is feeding us blocks.
    Downloading { peer: PeerId, last_progress: Instant },
}

/// The initial-block-download coordinator.
pub struct Ibd {
    phase: Phase,
    /// Out-of-order blocks, keyed by the parent hash they are waiting for.
    /// Survives peer disconnects: another peer may still deliver the gap.
    pending: HashMap<block::Hash, Vec<Arc<Block>>>,
    peer_heights: HashMap<PeerId, u32>,
}

impl Default for Ibd {
    fn default() -> Self {
        Ibd::new()
    }
}

impl Ibd {
    /// An idle coordinator.
    pub fn new() -> Ibd {
        Ibd {
            phase: Phase::Idle,
            pending: HashMap::new(),
            peer_heights: HashMap::new(),
        }
    }

    /// Whether a sync is in flight.
    pub fn is_active(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Whether `hash` is sitting in the out-of-order buffer.
    pub fn has_buffered(&self, hash: &block::Hash) -> bool {
        self.pending
            .values()
            .any(|blocks| blocks.iter().any(|block| block.hash() == *hash))
    }

    /// A peer finished its handshake; start syncing if it is ahead of us.
    pub fn peer_connected(
        &mut self,
        peer: PeerId,
        best_height: u32,
        chain: &ChainState,
        peers: &PeerSet,
    ) {
        self.peer_heights.insert(peer, best_height);
        self.maybe_start(chain, peers);
    }

    /// A peer went away. In-flight requests to it are cancelled; buffered
    /// blocks are retained and may still connect from another source.
    pub fn peer_disconnected(&mut self, peer: PeerId) {
        self.peer_heights.remove(&peer);
        let active = match self.phase {
            Phase::Requesting { peer, .. } | Phase::Downloading { peer, .. } => Some(peer),
            Phase::Idle => None,
        };
        if active == Some(peer) {
            debug!(peer, "sync peer disconnected, dropping in-flight requests");
            self.phase = Phase::Idle;
        }
    }

    /// The sync peer advertised block inventory: the download is live.
    pub fn note_inventory(&mut self, peer: PeerId) {
        match self.phase {
            Phase::Requesting { peer: active, .. } | Phase::Downloading { peer: active, .. }
                if active == peer =>
            {
                self.phase = Phase::Downloading {
                    peer,
                    last_progress: Instant::now(),
                };
            }
            _ => {}
        }
    }

    /// Stash a block whose parent we do not have yet.
    pub fn buffer_orphan(&mut self, block: Arc<Block>) {
        self.pending
            .entry(block.header.previous_block_hash)
            .or_default()
            .push(block);
    }

    /// Ask `peer` for the gap below a freshly arrived orphan, unless a
    /// sync is already running.
    pub fn request_missing(&mut self, peer: PeerId, chain: &ChainState, peers: &PeerSet) {
        if matches!(self.phase, Phase::Idle) {
            self.send_request(peer, chain, peers);
        }
    }

    /// Connect every buffered block whose parent is now known, repeating
    /// until the buffer yields nothing more.
    pub fn drain(&mut self, chain: &ChainState, peers: &PeerSet) {
        let mut connected_any = false;
        loop {
            let ready: Vec<block::Hash> = self
                .pending
                .keys()
                .filter(|parent| chain.contains_block(parent))
                .copied()
                .collect();
            if ready.is_empty() {
                break;
            }
            for parent in ready {
                for block in self.pending.remove(&parent).unwrap_or_default() {
                    let hash = block.hash();
                    match chain.commit_block(block) {
                        Ok(()) => {
                            connected_any = true;
                            debug!(%hash, "buffered block connected");
                        }
                        Err(ChainError::Duplicate(_)) => {}
                        Err(err) if err.is_fatal() => {
                            error!(%err, "chain state is inconsistent; aborting");
                            std::process::abort();
                        }
                        Err(err) => debug!(%hash, %err, "buffered block rejected"),
                    }
                }
            }
        }
        if connected_any {
            self.note_progress(chain, peers);
        }
    }

    /// Periodic stale check, driven by the dispatcher's timer.
    pub fn tick(&mut self, chain: &ChainState, peers: &PeerSet) {
        let stale_peer = match self.phase {
            Phase::Requesting { peer, since } if since.elapsed() >= IBD_STALE_TIMEOUT => Some(peer),
            Phase::Downloading {
                peer,
                last_progress,
            } if last_progress.elapsed() >= IBD_STALE_TIMEOUT => Some(peer),
            _ => None,
        };
        if let Some(peer) = stale_peer {
            warn!(peer, error = %crate::PeerError::Stale, "re-requesting with a fresh locator");
            if self.peer_heights.contains_key(&peer) {
                self.send_request(peer, chain, peers);
            } else {
                self.phase = Phase::Idle;
            }
        }
        if matches!(self.phase, Phase::Idle) {
            self.maybe_start(chain, peers);
        }
    }

    fn local_height(chain: &ChainState) -> i64 {
        chain
            .tip_height()
            .map(|height| i64::from(height.0))
            .unwrap_or(-1)
    }

    fn maybe_start(&mut self, chain: &ChainState, peers: &PeerSet) {
        if !matches!(self.phase, Phase::Idle) {
            return;
        }
        let local = Self::local_height(chain);
        let candidate = self
            .peer_heights
            .iter()
            .filter(|(_, height)| i64::from(**height) > local)
            .max_by_key(|(_, height)| **height)
            .map(|(peer, _)| *peer);
        if let Some(peer) = candidate {
            self.send_request(peer, chain, peers);
        }
    }

    fn send_request(&mut self, peer: PeerId, chain: &ChainState, peers: &PeerSet) {
        let locator = chain.locator();
        debug!(peer, locator_len = locator.len(), "requesting blocks");
        peers.send(
            peer,
            Message::GetBlocks(GetBlocks {
                known_blocks: locator,
                stop_hash: None,
            }),
        );
        self.phase = Phase::Requesting {
            peer,
            since: Instant::now(),
        };
    }

    /// Progress happened: either refresh the download clock or, once we
    /// have caught up to the sync peer's advertised height, go idle.
    fn note_progress(&mut self, chain: &ChainState, peers: &PeerSet) {
        let peer = match self.phase {
            Phase::Requesting { peer, .. } | Phase::Downloading { peer, .. } => peer,
            Phase::Idle => return,
        };
        let target = self.peer_heights.get(&peer).copied().unwrap_or(0);
        if Self::local_height(chain) >= i64::from(target) {
            info!(target, "initial block download caught up");
            self.phase = Phase::Idle;
            // Another peer may already be further ahead.
            self.maybe_start(chain, peers);
        } else {
            self.phase = Phase::Downloading {
                peer,
                last_progress: Instant::now(),
            };
        }
    }
}
