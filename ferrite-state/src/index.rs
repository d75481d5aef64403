//! The block-index tree: every known block, its height and cumulative
//! work, and the `next_main` pointers that mark out the best chain.
//!
//! Nodes live in an arena (`Vec<Node>` addressed by [`NodeId`]) so parent
//! and child links are plain indices instead of reference cycles. A node is
//! on the main chain iff it is reachable from genesis by following
//! `next_main`; at any moment at most one child of a node is linked that
//! way.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use ferrite_chain::{
    block::{self, Block},
    parameters::{GENESIS_PREVIOUS_BLOCK_HASH, MEDIAN_TIME_SPAN},
    work::difficulty::Work,
};

use crate::error::StateError;

/// Identifies a node in the block-index arena. Stable for the life of the
/// index; nodes are never removed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A single known block and its position in the tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// The full block.
    pub block: Arc<Block>,
    /// The block hash, memoized.
    pub hash: block::Hash,
    /// Height above genesis.
    pub height: block::Height,
    /// The parent node; `None` only for genesis.
    pub parent: Option<NodeId>,
    /// Every known child, main chain or not.
    pub children: Vec<NodeId>,
    /// The next node on the main chain, when this node is on it.
    pub next_main: Option<NodeId>,
    /// Total work from genesis through this block.
    pub chain_work: Work,
}

/// What happened when a block was inserted.
#[derive(Debug, Clone)]
pub enum Insertion {
    /// The block extends the current best chain; the tip moved forward.
    Extended {
        /// The new tip.
        id: NodeId,
    },
    /// The block's branch overtook the best chain; the main-chain path was
    /// rewired.
    Reorganized {
        /// The new tip.
        id: NodeId,
        /// The last common ancestor of the old and new tips.
        fork: NodeId,
        /// Old main-chain blocks above the fork, tip first.
        disconnected: Vec<Arc<Block>>,
        /// New main-chain blocks above the fork, in height order.
        connected: Vec<(Arc<Block>, block::Height)>,
    },
    /// The block landed on a side branch with no more work than the tip.
    /// First seen wins ties, so the tip is unchanged.
    SideChain {
        /// The side-branch node.
        id: NodeId,
    },
}

/// The tree of all known blocks.
#[derive(Debug, Default)]
pub struct BlockIndex {
    nodes: Vec<Node>,
    by_hash: HashMap<block::Hash, NodeId>,
    genesis: Option<NodeId>,
    tip: Option<NodeId>,
}

impl BlockIndex {
    /// An empty index.
    pub fn new() -> BlockIndex {
        BlockIndex::default()
    }

    /// The current best tip, if any block has been inserted.
    pub fn tip(&self) -> Option<NodeId> {
        self.tip
    }

    /// The hash of the current best tip.
    pub fn tip_hash(&self) -> Option<block::Hash> {
        self.tip.map(|id| self.nodes[id.0].hash)
    }

    /// The height of the current best tip.
    pub fn tip_height(&self) -> Option<block::Height> {
        self.tip.map(|id| self.nodes[id.0].height)
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Resolve a block hash to its node.
    pub fn lookup(&self, hash: &block::Hash) -> Option<NodeId> {
        self.by_hash.get(hash).copied()
    }

    /// Whether `hash` is a known block (main chain or side branch).
    pub fn contains(&self, hash: &block::Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// The full block behind `hash`, if known.
    pub fn block(&self, hash: &block::Hash) -> Option<Arc<Block>> {
        self.lookup(hash).map(|id| self.nodes[id.0].block.clone())
    }

    /// The number of known blocks.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a block, linking it under its parent and moving the tip if
    /// the new branch carries strictly more work.
    ///
    /// The index performs no consensus validation; callers validate before
    /// inserting. Fails on duplicates, on unknown parents (orphans are the
    /// caller's problem to buffer), and on difficulty fields that expand to
    /// no target.
    pub fn insert(&mut self, block: Arc<Block>) -> Result<Insertion, StateError> {
        let hash = block.hash();
        if self.by_hash.contains_key(&hash) {
            return Err(StateError::Duplicate(hash));
        }

        let block_work = block
            .header
            .difficulty_threshold
            .to_expanded()
            .ok_or(StateError::InvalidDifficulty(hash))?
            .to_work();

        let parent_hash = block.header.previous_block_hash;
        if parent_hash == GENESIS_PREVIOUS_BLOCK_HASH && self.genesis.is_none() {
            let id = NodeId(self.nodes.len());
            self.nodes.push(Node {
                block,
                hash,
                height: block::Height(0),
                parent: None,
                children: Vec::new(),
                next_main: None,
                chain_work: block_work,
            });
            self.by_hash.insert(hash, id);
            self.genesis = Some(id);
            self.tip = Some(id);
            info!(%hash, "genesis block adopted");
            return Ok(Insertion::Extended { id });
        }

        let parent = self
            .lookup(&parent_hash)
            .ok_or(StateError::Orphan {
                hash,
                parent: parent_hash,
            })?;

        let id = NodeId(self.nodes.len());
        let height = self.nodes[parent.0].height.next();
        let chain_work = self.nodes[parent.0].chain_work + block_work;
        self.nodes.push(Node {
            block,
            hash,
            height,
            parent: Some(parent),
            children: Vec::new(),
            next_main: None,
            chain_work,
        });
        self.by_hash.insert(hash, id);
        self.nodes[parent.0].children.push(id);

        let tip = self
            .tip
            .expect("a non-empty index always has a tip");
        // Strictly more work moves the tip; on a tie the incumbent stays.
        if self.nodes[id.0].chain_work <= self.nodes[tip.0].chain_work {
            debug!(%hash, height = height.0, "side-chain block stored");
            return Ok(Insertion::SideChain { id });
        }

        if parent == tip {
            self.nodes[tip.0].next_main = Some(id);
            self.tip = Some(id);
            return Ok(Insertion::Extended { id });
        }

        Ok(self.reorganize_to(id))
    }

    /// Rewire the main-chain path from the old tip to `new_tip` and collect
    /// the blocks the chain state must disconnect and connect.
    fn reorganize_to(&mut self, new_tip: NodeId) -> Insertion {
        let old_tip = self.tip.expect("reorganize requires an existing tip");
        let fork = self.last_common_ancestor(old_tip, new_tip);

        // Old path above the fork loses its next pointers, tip first.
        let mut disconnected = Vec::new();
        let mut current = old_tip;
        while current != fork {
            self.nodes[current.0].next_main = None;
            disconnected.push(self.nodes[current.0].block.clone());
            current = self.nodes[current.0]
                .parent
                .expect("the fork is an ancestor of the old tip");
        }

        // New path above the fork, collected tip-down then reversed so the
        // chain state can connect in height order.
        let mut path = Vec::new();
        let mut current = new_tip;
        while current != fork {
            path.push(current);
            current = self.nodes[current.0]
                .parent
                .expect("the fork is an ancestor of the new tip");
        }
        path.reverse();

        let mut previous = fork;
        let mut connected = Vec::new();
        for id in path {
            self.nodes[previous.0].next_main = Some(id);
            connected.push((self.nodes[id.0].block.clone(), self.nodes[id.0].height));
            previous = id;
        }
        self.nodes[new_tip.0].next_main = None;
        self.tip = Some(new_tip);

        info!(
            old_tip = %self.nodes[old_tip.0].hash,
            new_tip = %self.nodes[new_tip.0].hash,
            fork_height = self.nodes[fork.0].height.0,
            depth = disconnected.len(),
            "chain reorganization",
        );

        Insertion::Reorganized {
            id: new_tip,
            fork,
            disconnected,
            connected,
        }
    }

    /// Force the main chain to end at `tip`, rewiring `next_main` pointers
    /// along the way. Lets a caller back out of a reorganization whose
    /// branch failed contextual validation; the losing blocks stay in the
    /// tree as a side branch.
    pub fn rewire_main_chain(&mut self, tip: NodeId) -> Insertion {
        self.reorganize_to(tip)
    }

    /// The last common ancestor of two nodes: walk the deeper side up to
    /// equal height, then walk both in lockstep.
    pub fn last_common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let mut a = a;
        let mut b = b;
        while self.nodes[a.0].height > self.nodes[b.0].height {
            a = self.nodes[a.0].parent.expect("deeper node has a parent");
        }
        while self.nodes[b.0].height > self.nodes[a.0].height {
            b = self.nodes[b.0].parent.expect("deeper node has a parent");
        }
        while a != b {
            a = self.nodes[a.0].parent.expect("nodes share a root");
            b = self.nodes[b.0].parent.expect("nodes share a root");
        }
        a
    }

    /// The ancestor `depth` blocks above `id`, if the chain reaches that
    /// far back.
    pub fn ancestor(&self, id: NodeId, depth: u32) -> Option<NodeId> {
        let mut current = id;
        for _ in 0..depth {
            current = self.nodes[current.0].parent?;
        }
        Some(current)
    }

    /// The median of the last (up to) 11 header times, inclusive of `id`.
    pub fn median_time_past(&self, id: NodeId) -> DateTime<Utc> {
        let mut times = Vec::with_capacity(MEDIAN_TIME_SPAN);
        let mut current = Some(id);
        while let Some(node) = current {
            if times.len() == MEDIAN_TIME_SPAN {
                break;
            }
            times.push(self.nodes[node.0].block.header.time);
            current = self.nodes[node.0].parent;
        }
        times.sort();
        times[times.len() / 2]
    }

    /// Build a block locator for the current tip: hashes walking back from
    /// the tip with stride 1 doubling each entry, at most 10 hops per
    /// stride, so the genesis hash is always the last entry.
    pub fn locator(&self) -> Vec<block::Hash> {
        let mut locator = Vec::new();
        let mut step = 1usize;
        let mut current = self.tip;
        while let Some(id) = current {
            locator.push(self.nodes[id.0].hash);
            let mut next = Some(id);
            for _ in 0..step.min(10) {
                next = match next {
                    Some(id) => self.nodes[id.0].parent,
                    None => break,
                };
            }
            current = next;
            step *= 2;
        }
        // A stride can overshoot the root; the locator must still end with
        // the genesis hash so the peer always finds a common point.
        if let Some(genesis) = self.genesis {
            let genesis_hash = self.nodes[genesis.0].hash;
            if locator.last() != Some(&genesis_hash) {
                locator.push(genesis_hash);
            }
        }
        if locator.is_empty() {
            locator.push(GENESIS_PREVIOUS_BLOCK_HASH);
        }
        locator
    }

    /// Answer a locator: the hashes of up to `limit` main-chain successors
    /// of the first locator entry found on the main chain. When nothing
    /// matches, the listing starts from genesis itself.
    pub fn blocks_after(&self, locator: &[block::Hash], limit: usize) -> Vec<block::Hash> {
        let fork = locator
            .iter()
            .filter_map(|hash| self.lookup(hash))
            .find(|id| self.is_on_main_chain(*id));

        let mut hashes = Vec::new();
        let mut current = match fork {
            Some(id) => self.nodes[id.0].next_main,
            // The requester shares nothing with us; start from the root.
            None => self.genesis,
        };
        while let Some(id) = current {
            if hashes.len() == limit {
                break;
            }
            hashes.push(self.nodes[id.0].hash);
            current = self.nodes[id.0].next_main;
        }
        hashes
    }

    /// Whether `id` is on the main chain: either the tip itself or linked
    /// forward by a `next_main` pointer.
    pub fn is_on_main_chain(&self, id: NodeId) -> bool {
        self.tip == Some(id) || self.nodes[id.0].next_main.is_some()
    }

    /// Main-chain node ids from genesis to tip.
    pub fn main_chain(&self) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.genesis;
        while let Some(id) = current {
            chain.push(id);
            current = self.nodes[id.0].next_main;
        }
        chain
    }
}
