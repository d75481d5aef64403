//! The inbound message dispatcher.
//!
//! One task consumes the whole peer-event queue, so message handling is
//! serial: the chain state sees blocks and transactions in arrival order,
//! and the IBD coordinator never races itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error};

use ferrite_chain::{block::Block, transaction::Transaction};
use ferrite_consensus::{ChainError, ChainState};

use crate::constants::MAX_GETBLOCKS_RESULTS;
use crate::ibd::Ibd;
use crate::peer::{PeerEvent, PeerId, PeerSet};
use crate::protocol::{
    get_blocks::GetBlocks,
    inv::InventoryHash,
    message::Message,
};

/// Routes every peer event to the chain state, mempool, or IBD
/// coordinator.
pub struct Dispatcher {
    chain: ChainState,
    peers: PeerSet,
    ibd: Ibd,
}

impl Dispatcher {
    /// A dispatcher over the given chain and peer set.
    pub fn new(chain: ChainState, peers: PeerSet) -> Dispatcher {
        Dispatcher {
            chain,
            peers,
            ibd: Ibd::new(),
        }
    }

    /// Consume peer events until the queue closes. A five-second timer
    /// drives the IBD stale check between events.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<PeerEvent>) {
        let mut stale_timer = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = stale_timer.tick() => self.ibd.tick(&self.chain, &self.peers),
            }
        }
        debug!("dispatcher stopped");
    }

    fn handle_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Connected { peer, best_height } => {
                self.ibd
                    .peer_connected(peer, best_height, &self.chain, &self.peers)
            }
            PeerEvent::Disconnected { peer } => self.ibd.peer_disconnected(peer),
            PeerEvent::Message { peer, message } => self.handle_message(peer, message),
        }
    }

    fn handle_message(&mut self, peer: PeerId, message: Message) {
        match message {
            // The handshake is handled inside the connection task; stray
            // repeats are tolerated and ignored.
            Message::Version { .. } | Message::Verack => {}
            Message::Inv(items) => self.handle_inv(peer, items),
            Message::GetData(items) => self.handle_get_data(peer, items),
            Message::Block(block) => self.handle_block(peer, block),
            Message::Tx(tx) => self.handle_tx(peer, tx),
            Message::GetBlocks(request) => self.handle_get_blocks(peer, request),
        }
    }

    /// Request whatever the advertisement names that we do not hold.
    fn handle_inv(&mut self, peer: PeerId, items: Vec<InventoryHash>) {
        let mut wanted = Vec::new();
        let mut advertised_blocks = false;
        for item in items {
            match item {
                InventoryHash::Block(hash) => {
                    advertised_blocks = true;
                    if !self.chain.contains_block(&hash) && !self.ibd.has_buffered(&hash) {
                        wanted.push(item);
                    }
                }
                InventoryHash::Tx(txid) => {
                    if !self.chain.mempool_contains(&txid) && !self.peers.is_seen(&txid.0) {
                        wanted.push(item);
                    }
                }
            }
        }
        if advertised_blocks {
            self.ibd.note_inventory(peer);
        }
        if !wanted.is_empty() {
            self.peers.send(peer, Message::GetData(wanted));
        }
    }

    /// Serve blocks from the index and transactions from the mempool.
    fn handle_get_data(&self, peer: PeerId, items: Vec<InventoryHash>) {
        for item in items {
            match item {
                InventoryHash::Block(hash) => {
                    if let Some(block) = self.chain.block(&hash) {
                        self.peers.send(peer, Message::Block(block));
                    }
                }
                InventoryHash::Tx(txid) => {
                    if let Some(tx) = self.chain.transaction(&txid) {
                        self.peers.send(peer, Message::Tx(tx));
                    }
                }
            }
        }
    }

    fn handle_block(&mut self, peer: PeerId, block: Arc<Block>) {
        let hash = block.hash();
        self.peers.mark_seen(hash.0);
        match self.chain.commit_block(block.clone()) {
            Ok(()) => {
                debug!(%hash, "block accepted from peer");
                self.peers.broadcast(
                    Message::Inv(vec![InventoryHash::Block(hash)]),
                    Some(peer),
                );
                // The new block may be the parent of buffered orphans.
                self.ibd.drain(&self.chain, &self.peers);
            }
            Err(ChainError::Orphan(parent)) => {
                debug!(%hash, %parent, "buffering orphan block");
                self.ibd.buffer_orphan(block);
                self.ibd.request_missing(peer, &self.chain, &self.peers);
            }
            Err(ChainError::Duplicate(_)) => {}
            Err(err) if err.is_fatal() => {
                error!(%err, "chain state is inconsistent; aborting");
                std::process::abort();
            }
            Err(err) => debug!(%hash, %err, "rejecting invalid block"),
        }
    }

    fn handle_tx(&mut self, peer: PeerId, tx: Arc<Transaction>) {
        let txid = tx.hash();
        self.peers.mark_seen(txid.0);
        match self.chain.stage_transaction(tx) {
            Ok(_) => {
                self.peers
                    .broadcast(Message::Inv(vec![InventoryHash::Tx(txid)]), Some(peer));
            }
            Err(ChainError::DuplicateTransaction(_)) => {}
            Err(err) => debug!(%txid, %err, "rejecting transaction"),
        }
    }

    /// Answer a locator with the inventory of up to 500 successor blocks.
    fn handle_get_blocks(&self, peer: PeerId, request: GetBlocks) {
        let mut hashes = self
            .chain
            .blocks_after(&request.known_blocks, MAX_GETBLOCKS_RESULTS);
        if let Some(stop) = request.stop_hash {
            if let Some(position) = hashes.iter().position(|hash| *hash == stop) {
                hashes.truncate(position + 1);
            }
        }
        if !hashes.is_empty() {
            self.peers.send(
                peer,
                Message::Inv(hashes.into_iter().map(InventoryHash::Block).collect()),
            );
        }
    }
}
