//! UTXO views for validation.
//!
//! The per-transaction validator judges a transaction against *some* set of
//! unspent outputs. For mempool admission that is the live [`UtxoSet`];
//! inside a block it is the live set overlaid with the spends and outputs
//! of the block's earlier transactions, so intra-block chains resolve and
//! intra-block double spends fail.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ferrite_chain::{
    block::Height,
    transaction::{OutPoint, Transaction},
};
use ferrite_state::{Utxo, UtxoSet};

/// Read access to unspent outputs.
pub trait UtxoView {
    /// Look up an unspent output.
    fn utxo(&self, outpoint: &OutPoint) -> Option<Utxo>;

    /// Whether `outpoint` is unspent in this view.
    fn is_unspent(&self, outpoint: &OutPoint) -> bool {
        self.utxo(outpoint).is_some()
    }
}

impl UtxoView for UtxoSet {
    fn utxo(&self, outpoint: &OutPoint) -> Option<Utxo> {
        UtxoSet::utxo(self, outpoint).cloned()
    }
}

/// A transient view layering one block's own effects over a base set.
///
/// Nothing here mutates the base; the authoritative set is only touched
/// once the whole block has validated.
pub struct BlockOverlay<'a> {
    base: &'a UtxoSet,
    spent: HashSet<OutPoint>,
    created: HashMap<OutPoint, Utxo>,
}

impl<'a> BlockOverlay<'a> {
    /// An overlay with no effects yet.
    pub fn new(base: &'a UtxoSet) -> BlockOverlay<'a> {
        BlockOverlay {
            base,
            spent: HashSet::new(),
            created: HashMap::new(),
        }
    }

    /// Record a spend. Returns `false` if the outpoint was already spent
    /// in this overlay (an intra-block double spend).
    pub fn spend(&mut self, outpoint: OutPoint) -> bool {
        // An output created earlier in the block may be consumed here.
        self.created.remove(&outpoint);
        self.spent.insert(outpoint)
    }

    /// Record the outputs a validated transaction creates.
    pub fn add_outputs(&mut self, transaction: &Arc<Transaction>, height: Height) {
        let from_coinbase = transaction.is_coinbase();
        let txid = transaction.hash();
        for (index, output) in transaction.outputs.iter().enumerate() {
            self.created.insert(
                OutPoint {
                    hash: txid,
                    index: index as u32,
                },
                Utxo {
                    output: output.clone(),
                    height,
                    from_coinbase,
                },
            );
        }
    }
}

impl UtxoView for BlockOverlay<'_> {
    fn utxo(&self, outpoint: &OutPoint) -> Option<Utxo> {
        if self.spent.contains(outpoint) {
            return None;
        }
        if let Some(utxo) = self.created.get(outpoint) {
            return Some(utxo.clone());
        }
        UtxoSet::utxo(self.base, outpoint).cloned()
    }
}
