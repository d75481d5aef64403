use thiserror::Error;

use ferrite_chain::{block, transaction::OutPoint};

/// State-layer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The referenced UTXO is absent from the set.
    #[error("utxo {0:?} not found or already spent")]
    MissingUtxo(OutPoint),

    /// A block arrived whose parent is not in the index.
    #[error("orphan block {hash}: parent {parent} is unknown")]
    Orphan {
        /// The orphan block's own hash.
        hash: block::Hash,
        /// The missing parent hash.
        parent: block::Hash,
    },

    /// The block is already in the index.
    #[error("duplicate block {0}")]
    Duplicate(block::Hash),

    /// The header's difficulty field expands to no valid target, so its
    /// chain work is undefined.
    #[error("block {0} carries an invalid difficulty encoding")]
    InvalidDifficulty(block::Hash),

    /// Undo data was missing mid-reorganization. The UTXO set can no
    /// longer be trusted; callers must treat this as a fatal consensus bug.
    #[error("reorg state inconsistent: {0}")]
    ReorgStateInconsistent(&'static str),
}
