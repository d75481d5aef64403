//! The unconfirmed-transaction staging area.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use ferrite_chain::transaction::{Hash, Transaction};

/// The default bound on mempool size, in transactions. Eviction policy
/// beyond this hard cap belongs to the surrounding policy layer.
pub const DEFAULT_MEMPOOL_LIMIT: usize = 10_000;

/// Validated transactions waiting to be mined, keyed by txid.
#[derive(Debug)]
pub struct Mempool {
    by_txid: HashMap<Hash, Arc<Transaction>>,
    limit: usize,
}

impl Default for Mempool {
    fn default() -> Self {
        Mempool::new()
    }
}

impl Mempool {
    /// An empty mempool with the default size bound.
    pub fn new() -> Mempool {
        Mempool::with_limit(DEFAULT_MEMPOOL_LIMIT)
    }

    /// An empty mempool bounded at `limit` transactions.
    pub fn with_limit(limit: usize) -> Mempool {
        Mempool {
            by_txid: HashMap::new(),
            limit,
        }
    }

    /// Whether `txid` is staged.
    pub fn contains(&self, txid: &Hash) -> bool {
        self.by_txid.contains_key(txid)
    }

    /// Look up a staged transaction.
    pub fn get(&self, txid: &Hash) -> Option<Arc<Transaction>> {
        self.by_txid.get(txid).cloned()
    }

    /// Stage a transaction. Returns `false` without inserting when the
    /// transaction is already present or the pool is full.
    pub fn insert(&mut self, transaction: Arc<Transaction>) -> bool {
        let txid = transaction.hash();
        if self.by_txid.contains_key(&txid) {
            return false;
        }
        if self.by_txid.len() >= self.limit {
            debug!(%txid, "mempool full, dropping transaction");
            return false;
        }
        self.by_txid.insert(txid, transaction);
        true
    }

    /// Remove a transaction, typically because a block confirmed it.
    pub fn remove(&mut self, txid: &Hash) -> Option<Arc<Transaction>> {
        self.by_txid.remove(txid)
    }

    /// A snapshot of every staged transaction, in no particular order.
    pub fn transactions(&self) -> Vec<Arc<Transaction>> {
        self.by_txid.values().cloned().collect()
    }

    /// The number of staged transactions.
    pub fn len(&self) -> usize {
        self.by_txid.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.by_txid.is_empty()
    }
}
