//! The chain state: block index, UTXO set and mempool composed under one
//! lock, with validated commits, atomic reorganizations, and subscriber
//! notifications fired outside the lock.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use ferrite_chain::{
    amount::Amount,
    block::{self, Block, Height},
    parameters::GENESIS_PREVIOUS_BLOCK_HASH,
    script::Script,
    serialization::wire_deserialize_exact,
    transaction::{self, Transaction},
};
use ferrite_state::{BlockIndex, Insertion, Mempool, Utxo, UtxoSet};

use crate::{
    block as block_check,
    error::ChainError,
    transaction as tx_check,
};

/// A subscriber callback, invoked with each block that reaches the main
/// chain. Reorganizations surface as a single notification carrying the new
/// tip.
pub type Subscriber = Box<dyn Fn(&Arc<Block>) + Send + Sync>;

struct StateInner {
    index: BlockIndex,
    utxos: UtxoSet,
    mempool: Mempool,
}

struct Shared {
    state: Mutex<StateInner>,
    subscribers: Mutex<Vec<Subscriber>>,
    tip_sender: watch::Sender<Option<block::Hash>>,
}

/// A cheaply clonable handle to the node's chain state.
///
/// All mutation and every query takes the single internal lock exactly
/// once, so observers see block commits atomically: index, UTXO set and
/// mempool never tear apart.
#[derive(Clone)]
pub struct ChainState {
    shared: Arc<Shared>,
}

impl Default for ChainState {
    fn default() -> Self {
        ChainState::new()
    }
}

impl ChainState {
    /// A fresh, empty chain state.
    pub fn new() -> ChainState {
        let (tip_sender, _) = watch::channel(None);
        ChainState {
            shared: Arc::new(Shared {
                state: Mutex::new(StateInner {
                    index: BlockIndex::new(),
                    utxos: UtxoSet::new(),
                    mempool: Mempool::new(),
                }),
                subscribers: Mutex::new(Vec::new()),
                tip_sender,
            }),
        }
    }

    /// Register a callback for main-chain updates. Callbacks run outside
    /// the state lock; a panicking subscriber is logged and skipped, never
    /// allowed to stall the chain.
    pub fn subscribe(&self, callback: impl Fn(&Arc<Block>) + Send + Sync + 'static) {
        self.shared
            .subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push(Box::new(callback));
    }

    /// A watch channel that yields the tip hash after every change. The
    /// miner uses this to abandon stale candidates.
    pub fn tip_watch(&self) -> watch::Receiver<Option<block::Hash>> {
        self.shared.tip_sender.subscribe()
    }

    /// Validate `block` and commit it to the chain.
    ///
    /// Extensions connect directly; heavier side branches trigger a
    /// disconnect/connect reorganization that either completes in full or
    /// leaves the previous state untouched. Valid blocks that do not beat
    /// the current tip are stored as side-chain entries.
    pub fn commit_block(&self, block: Arc<Block>) -> Result<(), ChainError> {
        let tip_changed = {
            let mut state = self.shared.state.lock().expect("chain state lock poisoned");
            state.commit(block.clone(), Utc::now())?
        };

        if tip_changed {
            let tip = self.tip_hash();
            let _ = self.shared.tip_sender.send(tip);
            self.notify(&block);
        }
        Ok(())
    }

    /// Decode and commit a block received from a trusted local caller.
    pub fn submit_block(&self, bytes: &[u8]) -> Result<block::Hash, ChainError> {
        let block: Block = wire_deserialize_exact(bytes)?;
        let hash = block.hash();
        self.commit_block(Arc::new(block))?;
        Ok(hash)
    }

    /// Validate a loose transaction against the current tip and stage it
    /// in the mempool.
    pub fn stage_transaction(&self, tx: Arc<Transaction>) -> Result<transaction::Hash, ChainError> {
        let mut state = self.shared.state.lock().expect("chain state lock poisoned");
        let txid = tx.hash();
        if state.mempool.contains(&txid) {
            return Err(ChainError::DuplicateTransaction(txid));
        }
        if tx.is_coinbase() {
            return Err(crate::TransactionError::UnexpectedCoinbaseInput.into());
        }

        let spending_height = state.next_height();
        // On first insert the locktime bound is the wall clock.
        tx_check::validate(&tx, &state.utxos, spending_height, Utc::now())?;

        if !state.mempool.insert(tx) {
            return Err(ChainError::MempoolFull);
        }
        debug!(%txid, "transaction staged");
        Ok(txid)
    }

    /// Decode and stage a transaction received from a trusted local caller.
    pub fn submit_transaction(&self, bytes: &[u8]) -> Result<transaction::Hash, ChainError> {
        let tx: Transaction = wire_deserialize_exact(bytes)?;
        self.stage_transaction(Arc::new(tx))
    }

    /// The hash of the best tip, if any block has been committed.
    pub fn tip_hash(&self) -> Option<block::Hash> {
        self.lock().index.tip_hash()
    }

    /// The height of the best tip.
    pub fn tip_height(&self) -> Option<Height> {
        self.lock().index.tip_height()
    }

    /// The height the next committed block will occupy.
    pub fn next_height(&self) -> Height {
        self.lock().next_height()
    }

    /// Fetch a block by hash, main chain or side branch.
    pub fn block(&self, hash: &block::Hash) -> Option<Arc<Block>> {
        self.lock().index.block(hash)
    }

    /// Whether `hash` names a known block.
    pub fn contains_block(&self, hash: &block::Hash) -> bool {
        self.lock().index.contains(hash)
    }

    /// Fetch a transaction by txid: the mempool first, then the main
    /// chain.
    pub fn transaction(&self, txid: &transaction::Hash) -> Option<Arc<Transaction>> {
        let state = self.lock();
        if let Some(tx) = state.mempool.get(txid) {
            return Some(tx);
        }
        for id in state.index.main_chain() {
            for tx in state.index.node(id).block.transactions.iter() {
                if tx.hash() == *txid {
                    return Some(tx.clone());
                }
            }
        }
        None
    }

    /// Whether `txid` is staged in the mempool.
    pub fn mempool_contains(&self, txid: &transaction::Hash) -> bool {
        self.lock().mempool.contains(txid)
    }

    /// A snapshot of the staged transactions.
    pub fn mempool_transactions(&self) -> Vec<Arc<Transaction>> {
        self.lock().mempool.transactions()
    }

    /// Total unspent value, optionally restricted to one lock script.
    pub fn balance(&self, filter: Option<&Script>) -> Amount {
        self.lock().utxos.balance(filter)
    }

    /// Every unspent output, optionally restricted to one lock script.
    pub fn list_unspent(&self, filter: Option<&Script>) -> Vec<(transaction::OutPoint, Utxo)> {
        self.lock().utxos.unspent_matching(filter)
    }

    /// The median time past of the current tip, if any.
    pub fn median_time_past(&self) -> Option<DateTime<Utc>> {
        let state = self.lock();
        state.index.tip().map(|tip| state.index.median_time_past(tip))
    }

    /// A locator for the current tip, for GETBLOCKS requests.
    pub fn locator(&self) -> Vec<block::Hash> {
        self.lock().index.locator()
    }

    /// Answer a peer's locator with up to `limit` main-chain successor
    /// hashes.
    pub fn blocks_after(&self, locator: &[block::Hash], limit: usize) -> Vec<block::Hash> {
        self.lock().index.blocks_after(locator, limit)
    }

    /// Run `f` with read access to the block index.
    pub fn with_index<T>(&self, f: impl FnOnce(&BlockIndex) -> T) -> T {
        f(&self.lock().index)
    }

    /// Run `f` with read access to the UTXO set.
    pub fn with_utxos<T>(&self, f: impl FnOnce(&UtxoSet) -> T) -> T {
        f(&self.lock().utxos)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateInner> {
        self.shared.state.lock().expect("chain state lock poisoned")
    }

    fn notify(&self, block: &Arc<Block>) {
        let subscribers = self
            .shared
            .subscribers
            .lock()
            .expect("subscriber lock poisoned");
        for subscriber in subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| subscriber(block))).is_err() {
                warn!("chain subscriber panicked; continuing");
            }
        }
    }
}

impl StateInner {
    fn next_height(&self) -> Height {
        self.index
            .tip_height()
            .map(Height::next)
            .unwrap_or(Height(0))
    }

    /// Validate and apply one block. Returns whether the tip moved.
    fn commit(&mut self, block: Arc<Block>, now: DateTime<Utc>) -> Result<bool, ChainError> {
        let hash = block.hash();
        if self.index.contains(&hash) {
            return Err(ChainError::Duplicate(hash));
        }

        let prev = block.header.previous_block_hash;
        let (height, median_time_past, extends_tip) = if self.index.is_empty() {
            if prev != GENESIS_PREVIOUS_BLOCK_HASH {
                return Err(ChainError::Orphan(prev));
            }
            // Genesis has no ancestors; its own time stands in for the MTP.
            (Height(0), block.header.time, true)
        } else {
            let parent = self
                .index
                .lookup(&prev)
                .ok_or(ChainError::Orphan(prev))?;
            (
                self.index.node(parent).height.next(),
                self.index.median_time_past(parent),
                Some(parent) == self.index.tip(),
            )
        };

        block_check::check_standalone(&block, now)?;

        // A block extending the tip is validated against the live set
        // before anything mutates. Side-branch blocks cannot be judged
        // against this view; their contextual validation happens if and
        // when a reorganization tries to connect them.
        if extends_tip {
            block_check::check_connectable(&block, &self.utxos, prev, height, median_time_past)?;
        }

        let old_tip = self.index.tip();
        match self.index.insert(block.clone())? {
            Insertion::Extended { .. } => {
                self.utxos
                    .connect_block(&block, height)
                    .map_err(ChainError::from)?;
                for tx in block.transactions.iter().skip(1) {
                    self.mempool.remove(&tx.hash());
                }
                info!(%hash, height = height.0, "block connected");
                Ok(true)
            }
            Insertion::SideChain { .. } => {
                debug!(%hash, "block stored on a side branch");
                Ok(false)
            }
            Insertion::Reorganized {
                fork,
                disconnected,
                connected,
                ..
            } => {
                match self.apply_reorg(fork, &disconnected, &connected) {
                    Ok(()) => Ok(true),
                    Err(err) => {
                        // The new branch failed contextual validation:
                        // restore the main-chain pointers and report. The
                        // UTXO set was never touched.
                        if let Some(old_tip) = old_tip {
                            self.index.rewire_main_chain(old_tip);
                        }
                        Err(err)
                    }
                }
            }
        }
    }

    /// Replay the UTXO set from the old branch onto the new one.
    ///
    /// All work happens on a scratch copy; the authoritative set is only
    /// replaced once every disconnect and connect has succeeded, so a
    /// failed reorganization leaves no partial state behind. Failures of
    /// the *disconnect* side mean the undo data was gone, which is the
    /// fatal [`ChainError::ReorgStateInconsistent`].
    fn apply_reorg(
        &mut self,
        fork: ferrite_state::NodeId,
        disconnected: &[Arc<Block>],
        connected: &[(Arc<Block>, Height)],
    ) -> Result<(), ChainError> {
        let mut trial = self.utxos.clone();

        for old_block in disconnected {
            trial
                .disconnect_block(old_block)
                .map_err(ChainError::from)?;
        }

        let mut parent = fork;
        for (new_block, height) in connected {
            let median_time_past = self.index.median_time_past(parent);
            block_check::check_transactions(new_block, &trial, *height, median_time_past)
                .map_err(ChainError::from)?;
            trial
                .connect_block(new_block, *height)
                .map_err(ChainError::from)?;
            parent = self
                .index
                .lookup(&new_block.hash())
                .expect("reorganization targets are in the index");
        }

        self.utxos = trial;

        // Transactions confirmed by the new branch leave the mempool;
        // transactions orphaned by the old branch go back in when they
        // still validate against the new view.
        for (new_block, _) in connected {
            for tx in new_block.transactions.iter().skip(1) {
                self.mempool.remove(&tx.hash());
            }
        }
        let resurrect_height = self.next_height();
        for old_block in disconnected {
            for tx in old_block.transactions.iter().skip(1) {
                if self.mempool.contains(&tx.hash()) {
                    continue;
                }
                if tx_check::validate(tx, &self.utxos, resurrect_height, Utc::now()).is_ok() {
                    self.mempool.insert(tx.clone());
                } else {
                    debug!(txid = %tx.hash(), "orphaned transaction is stale, dropping");
                }
            }
        }

        Ok(())
    }
}
