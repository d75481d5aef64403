//! Consensus error types.
//!
//! Validation errors are recoverable: the offending transaction or block is
//! rejected and the chain state is left intact.
//! [`ChainError::ReorgStateInconsistent`] is the exception; it means the
//! UTXO set can no longer be trusted and must abort the node.

use thiserror::Error;

use ferrite_chain::{block, transaction, SerializationError};
use ferrite_state::StateError;

/// Reasons a transaction fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// The transaction has no inputs.
    #[error("transaction has no inputs")]
    NoInputs,

    /// The transaction has no outputs.
    #[error("transaction has no outputs")]
    NoOutputs,

    /// The serialized transaction exceeds the size limit.
    #[error("serialized transaction exceeds the size limit")]
    OversizeTx,

    /// An output value is negative or above the money cap.
    #[error("output {0} value is out of range")]
    BadOutputValue(usize),

    /// Inputs are worth less than outputs.
    #[error("inputs are worth less than outputs")]
    NegativeFee,

    /// An input references an outpoint that is not unspent in the view.
    #[error("input {index} spends a non-existent utxo")]
    NonExistentUtxo {
        /// The offending input index.
        index: usize,
    },

    /// An input spends a coinbase output that has not matured.
    #[error("input {index} spends an immature coinbase output")]
    ImmatureCoinbaseSpend {
        /// The offending input index.
        index: usize,
    },

    /// The coinbase data is outside the 2..=100 byte range.
    #[error("coinbase data length must be 2..=100 bytes")]
    BadCoinbaseScriptSig,

    /// The transaction's locktime has not been reached.
    #[error("locktime is not yet satisfied")]
    LockTimeNotMet,

    /// Script verification returned false for an input.
    #[error("script verification failed for input {index}")]
    ScriptFail {
        /// The offending input index.
        index: usize,
    },

    /// A coinbase-style (null outpoint) input appeared outside a block's
    /// first transaction.
    #[error("coinbase input outside the coinbase position")]
    UnexpectedCoinbaseInput,

    /// The same outpoint is spent twice within one transaction.
    #[error("outpoint spent twice in one transaction")]
    DuplicateSpend,
}

/// Reasons a block fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// The header's previous hash does not match the expected parent.
    #[error("previous hash mismatch: expected {expected}, got {actual}")]
    BadPrevHash {
        /// The parent the block was expected to build on.
        expected: block::Hash,
        /// The parent the header names.
        actual: block::Hash,
    },

    /// The header time is more than two hours past the local clock.
    #[error("block time is too far in the future")]
    TimeTooFar,

    /// The version field is below the minimum.
    #[error("unsupported block version {0}")]
    BadVersion(i32),

    /// The block hash exceeds the target its difficulty field encodes.
    #[error("block hash does not meet the difficulty target")]
    PowFailed,

    /// The difficulty field expands to no valid target.
    #[error("difficulty field expands to no valid target")]
    InvalidDifficulty,

    /// Recomputing the merkle root gives a different value than the header.
    #[error("merkle root does not commit to the block's transactions")]
    BadMerkleRoot,

    /// Two transactions in the block share a txid.
    #[error("block contains duplicate transactions")]
    DuplicateTransaction,

    /// The block has no transactions at all.
    #[error("block has no transactions")]
    NoTransactions,

    /// The first transaction is not a coinbase.
    #[error("the first transaction is not a coinbase")]
    NoCoinbase,

    /// A transaction after the first is a coinbase.
    #[error("coinbase transaction outside the first position")]
    ExtraCoinbase,

    /// The coinbase has no outputs or a worthless first output.
    #[error("coinbase output is missing or worthless")]
    BadCoinbaseOutput,

    /// The coinbase pays out more than subsidy plus fees.
    #[error("coinbase claims more than subsidy plus fees")]
    OversizeCoinbaseValue,

    /// A contained transaction failed validation.
    #[error("transaction {txid}: {source}")]
    Transaction {
        /// The offending transaction.
        txid: transaction::Hash,
        /// What went wrong with it.
        #[source]
        source: TransactionError,
    },
}

/// Errors from committing blocks and transactions to the chain state.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The block's parent is unknown; the caller may buffer and retry once
    /// the parent connects.
    #[error("orphan block: parent {0} is unknown")]
    Orphan(block::Hash),

    /// The block is already known.
    #[error("duplicate block {0}")]
    Duplicate(block::Hash),

    /// The transaction is already staged.
    #[error("duplicate transaction {0}")]
    DuplicateTransaction(transaction::Hash),

    /// The mempool is at its size bound.
    #[error("mempool is full")]
    MempoolFull,

    /// The block violated a consensus rule.
    #[error(transparent)]
    Block(#[from] BlockError),

    /// The transaction violated a consensus rule.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// The submitted bytes did not decode.
    #[error("serialization: {0}")]
    Serialization(#[from] SerializationError),

    /// A reorganization left the state without usable undo data. Fatal:
    /// this is a consensus bug and the process must halt.
    #[error("reorg state inconsistent: {0}")]
    ReorgStateInconsistent(StateError),
}

impl From<StateError> for ChainError {
    fn from(err: StateError) -> ChainError {
        match err {
            StateError::Orphan { parent, .. } => ChainError::Orphan(parent),
            StateError::Duplicate(hash) => ChainError::Duplicate(hash),
            StateError::InvalidDifficulty(_) => ChainError::Block(BlockError::InvalidDifficulty),
            err @ (StateError::MissingUtxo(_) | StateError::ReorgStateInconsistent(_)) => {
                ChainError::ReorgStateInconsistent(err)
            }
        }
    }
}

impl ChainError {
    /// Whether this error must abort the node rather than merely reject the
    /// offending input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::ReorgStateInconsistent(_))
    }
}
