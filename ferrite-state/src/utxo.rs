//! The authoritative set of unspent transaction outputs.

use std::collections::HashMap;

use tracing::trace;

use ferrite_chain::{
    amount::Amount,
    block::{Block, Height},
    parameters::MAX_REORG_DEPTH,
    script::Script,
    transaction::{OutPoint, Output},
};
use ferrite_script::is_unspendable;

use crate::error::StateError;

/// An unspent transaction output, with the context validation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// The output itself.
    pub output: Output,
    /// The height of the block that created this output.
    pub height: Height,
    /// Whether the creating transaction was a coinbase. Coinbase outputs
    /// are subject to the maturity rule.
    pub from_coinbase: bool,
}

/// A spent-cache entry: the UTXO plus the height at which it was spent,
/// kept so a reorganization can restore it.
#[derive(Debug, Clone)]
struct SpentUtxo {
    utxo: Utxo,
    spent_at: Height,
}

/// The outpoint-keyed UTXO map, with a bounded spent cache for reorg
/// support.
///
/// Invariant: after any sequence of connect/disconnect calls driven by the
/// chain state, the map equals what replaying the main chain from genesis
/// would produce. The set is `Clone` so a reorganization can be replayed
/// on a scratch copy and adopted only once it fully succeeds.
#[derive(Debug, Default, Clone)]
pub struct UtxoSet {
    utxos: HashMap<OutPoint, Utxo>,
    spent: HashMap<OutPoint, SpentUtxo>,
}

impl UtxoSet {
    /// An empty set.
    pub fn new() -> UtxoSet {
        UtxoSet::default()
    }

    /// The number of unspent entries.
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    /// Whether the set has no unspent entries.
    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// Look up an unspent output.
    pub fn utxo(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.utxos.get(outpoint)
    }

    /// Whether `outpoint` is currently unspent. O(1).
    pub fn is_unspent(&self, outpoint: &OutPoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    /// Insert a freshly created output.
    ///
    /// Provably unspendable outputs (OP_RETURN data carriers) are silently
    /// skipped; they can never be spent, so tracking them only bloats the
    /// set.
    pub fn insert(&mut self, outpoint: OutPoint, utxo: Utxo) {
        if is_unspendable(&utxo.output.lock_script) {
            trace!(?outpoint, "skipping unspendable output");
            return;
        }
        self.utxos.insert(outpoint, utxo);
    }

    /// Spend an output, moving it into the spent cache.
    pub fn spend(&mut self, outpoint: OutPoint, spent_at: Height) -> Result<Utxo, StateError> {
        let utxo = self
            .utxos
            .remove(&outpoint)
            .ok_or(StateError::MissingUtxo(outpoint))?;
        self.spent.insert(
            outpoint,
            SpentUtxo {
                utxo: utxo.clone(),
                spent_at,
            },
        );
        Ok(utxo)
    }

    /// Apply a block: spend every input of every non-coinbase transaction
    /// (in input order), then insert every output of every transaction.
    pub fn connect_block(&mut self, block: &Block, height: Height) -> Result<(), StateError> {
        for transaction in block.transactions.iter() {
            if transaction.is_coinbase() {
                continue;
            }
            for input in transaction.inputs.iter() {
                if let Some(outpoint) = input.outpoint() {
                    self.spend(outpoint, height)?;
                }
            }
        }

        for transaction in block.transactions.iter() {
            let from_coinbase = transaction.is_coinbase();
            let txid = transaction.hash();
            for (index, output) in transaction.outputs.iter().enumerate() {
                self.insert(
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

        self.prune_spent_cache(height);
        Ok(())
    }

    /// Undo a block: delete every output it created, then restore every
    /// input it spent from the spent cache.
    ///
    /// A missing entry on either side means the set no longer corresponds
    /// to the chain and the error is fatal; the reorg path must never leave
    /// the set half-updated silently.
    pub fn disconnect_block(&mut self, block: &Block) -> Result<(), StateError> {
        for transaction in block.transactions.iter() {
            let txid = transaction.hash();
            for (index, output) in transaction.outputs.iter().enumerate() {
                if is_unspendable(&output.lock_script) {
                    continue;
                }
                let outpoint = OutPoint {
                    hash: txid,
                    index: index as u32,
                };
                if self.utxos.remove(&outpoint).is_none() {
                    return Err(StateError::ReorgStateInconsistent(
                        "output created by the disconnected block is not in the set",
                    ));
                }
            }
        }

        for transaction in block.transactions.iter() {
            if transaction.is_coinbase() {
                continue;
            }
            for input in transaction.inputs.iter() {
                if let Some(outpoint) = input.outpoint() {
                    let entry = self.spent.remove(&outpoint).ok_or(
                        StateError::ReorgStateInconsistent(
                            "spent cache is missing an entry for the disconnected block",
                        ),
                    )?;
                    self.utxos.insert(outpoint, entry.utxo);
                }
            }
        }

        Ok(())
    }

    /// Sum of unspent values, optionally restricted to outputs locked by
    /// `filter`.
    pub fn balance(&self, filter: Option<&Script>) -> Amount {
        let total = self
            .utxos
            .values()
            .filter(|utxo| match filter {
                Some(script) => utxo.output.lock_script == *script,
                None => true,
            })
            .map(|utxo| utxo.output.value)
            .try_fold(Amount::ZERO, Amount::checked_add);
        // The chain caps every output at MAX_MONEY and validation enforces
        // it, so the sum of real entries cannot overflow.
        total.unwrap_or(Amount::from_sats(i64::MAX))
    }

    /// All unspent entries, optionally restricted to outputs locked by
    /// `filter`.
    pub fn unspent_matching(&self, filter: Option<&Script>) -> Vec<(OutPoint, Utxo)> {
        self.utxos
            .iter()
            .filter(|(_, utxo)| match filter {
                Some(script) => utxo.output.lock_script == *script,
                None => true,
            })
            .map(|(outpoint, utxo)| (*outpoint, utxo.clone()))
            .collect()
    }

    /// Drop spent-cache entries deeper than the supported reorg depth.
    fn prune_spent_cache(&mut self, tip: Height) {
        let horizon = tip.0.saturating_sub(MAX_REORG_DEPTH);
        self.spent.retain(|_, entry| entry.spent_at.0 >= horizon);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_chain::transaction::Hash;
    use ferrite_script::builder;

    fn outpoint(tag: u8, index: u32) -> OutPoint {
        OutPoint {
            hash: Hash([tag; 32]),
            index,
        }
    }

    fn utxo(sats: i64, height: u32, from_coinbase: bool) -> Utxo {
        Utxo {
            output: Output {
                value: Amount::from_sats(sats),
                lock_script: Script::new(vec![0x51]),
            },
            height: Height(height),
            from_coinbase,
        }
    }

    #[test]
    fn spend_moves_entries_to_the_cache_and_back() {
        let mut set = UtxoSet::new();
        let op = outpoint(1, 0);
        set.insert(op, utxo(50, 1, true));
        assert!(set.is_unspent(&op));

        let spent = set.spend(op, Height(2)).unwrap();
        assert_eq!(spent.output.value, Amount::from_sats(50));
        assert!(!set.is_unspent(&op));

        // A second spend of the same outpoint fails.
        assert_eq!(
            set.spend(op, Height(2)),
            Err(StateError::MissingUtxo(op)),
        );
    }

    #[test]
    fn unspendable_outputs_are_never_inserted() {
        let mut set = UtxoSet::new();
        let op = outpoint(2, 0);
        set.insert(
            op,
            Utxo {
                output: Output {
                    value: Amount::ZERO,
                    lock_script: builder::op_return(b"data"),
                },
                height: Height(1),
                from_coinbase: false,
            },
        );
        assert!(!set.is_unspent(&op));
        assert!(set.is_empty());
    }

    #[test]
    fn balance_filters_by_script() {
        let mut set = UtxoSet::new();
        let script_a = Script::new(vec![0x51]);
        let script_b = Script::new(vec![0x52]);
        set.insert(
            outpoint(1, 0),
            Utxo {
                output: Output {
                    value: Amount::from_sats(30),
                    lock_script: script_a.clone(),
                },
                height: Height(1),
                from_coinbase: false,
            },
        );
        set.insert(
            outpoint(1, 1),
            Utxo {
                output: Output {
                    value: Amount::from_sats(12),
                    lock_script: script_b.clone(),
                },
                height: Height(1),
                from_coinbase: false,
            },
        );

        assert_eq!(set.balance(None), Amount::from_sats(42));
        assert_eq!(set.balance(Some(&script_a)), Amount::from_sats(30));
        assert_eq!(set.balance(Some(&script_b)), Amount::from_sats(12));
        assert_eq!(set.unspent_matching(Some(&script_a)).len(), 1);
    }

    #[test]
    fn spent_cache_is_pruned_beyond_the_reorg_horizon() {
        let mut set = UtxoSet::new();
        let old = outpoint(1, 0);
        let recent = outpoint(2, 0);
        set.insert(old, utxo(1, 1, false));
        set.insert(recent, utxo(2, 1, false));

        set.spend(old, Height(10)).unwrap();
        set.spend(recent, Height(300)).unwrap();
        set.prune_spent_cache(Height(300));

        assert!(!set.spent.contains_key(&old));
        assert!(set.spent.contains_key(&recent));
    }
}
