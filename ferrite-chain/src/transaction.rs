//! Transactions and transaction-related structures.

mod hash;
mod lock_time;
mod serialize;

#[cfg(test)]
mod tests;

pub use hash::Hash;
pub use lock_time::LockTime;
pub use serialize::MAX_TX_SIZE;

use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount, cached::Cached, script::Script, serialization::CompactInt,
};

/// A reference to a particular output of a previous transaction.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// The transaction containing the output being spent.
    pub hash: Hash,
    /// The index of the output within that transaction; the first output
    /// is 0.
    pub index: u32,
}

impl OutPoint {
    /// The serialized length of an outpoint, in bytes.
    pub const LEN: usize = 36;

    /// The null outpoint, used only by coinbase inputs.
    pub const fn null() -> OutPoint {
        OutPoint {
            hash: Hash([0; 32]),
            index: u32::MAX,
        }
    }

    /// Whether this is the null outpoint.
    pub fn is_null(&self) -> bool {
        self.hash.0 == [0; 32] && self.index == u32::MAX
    }
}

/// Arbitrary data inserted by a miner into its coinbase input.
///
/// Consensus requires 2..=100 bytes, enforced during validation rather than
/// parsing so that the error is reported against the right rule.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoinbaseData(pub Vec<u8>);

impl CoinbaseData {
    /// The encoded length: compact-size prefix plus the raw bytes.
    pub fn serialized_size(&self) -> usize {
        CompactInt::size(self.0.len()) + self.0.len()
    }
}

impl AsRef<[u8]> for CoinbaseData {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for CoinbaseData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CoinbaseData")
            .field(&hex::encode(&self.0))
            .finish()
    }
}

/// A transaction input.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Input {
    /// A spend of an output of a previous transaction.
    PrevOut {
        /// The previous output being spent.
        outpoint: OutPoint,
        /// The script that authorizes spending `outpoint`.
        unlock_script: Script,
        /// The sequence number for this input.
        sequence: u32,
    },
    /// New coins created by the block reward.
    Coinbase {
        /// Free-form data inserted by the miner; by convention the first
        /// push encodes the block height.
        data: CoinbaseData,
        /// The sequence number for this input.
        sequence: u32,
    },
}

impl Input {
    /// The default sequence number, which disables locktime semantics.
    pub const FINAL_SEQUENCE: u32 = u32::MAX;

    /// The sequence number of this input.
    pub fn sequence(&self) -> u32 {
        match self {
            Input::PrevOut { sequence, .. } | Input::Coinbase { sequence, .. } => *sequence,
        }
    }

    /// The outpoint this input spends, or `None` for a coinbase input.
    pub fn outpoint(&self) -> Option<OutPoint> {
        match self {
            Input::PrevOut { outpoint, .. } => Some(*outpoint),
            Input::Coinbase { .. } => None,
        }
    }

    /// The serialized length of this input, in bytes.
    pub fn serialized_size(&self) -> usize {
        match self {
            Input::PrevOut { unlock_script, .. } => {
                OutPoint::LEN + unlock_script.serialized_size() + 4
            }
            Input::Coinbase { data, .. } => OutPoint::LEN + data.serialized_size() + 4,
        }
    }
}

/// A transaction output: an indivisible unit of value locked by a script.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Output {
    /// The output value, in satoshis.
    pub value: Amount,
    /// The script that must be satisfied to spend this output.
    pub lock_script: Script,
}

impl Output {
    /// The serialized length of this output, in bytes.
    pub fn serialized_size(&self) -> usize {
        8 + self.lock_script.serialized_size()
    }
}

/// A transaction: a versioned transfer of value from inputs to outputs.
///
/// Transactions are content-addressed: the txid is the SHA256d digest of the
/// canonical serialization, so any mutation produces a new identity.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The transaction version.
    pub version: i32,
    /// The transaction inputs.
    pub inputs: Vec<Input>,
    /// The transaction outputs.
    pub outputs: Vec<Output>,
    /// The earliest height or time this transaction may be committed.
    pub lock_time: LockTime,
    hash: Cached<Hash>,
}

impl Transaction {
    /// Assemble a transaction from its parts.
    pub fn new(
        version: i32,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        lock_time: LockTime,
    ) -> Transaction {
        Transaction {
            version,
            inputs,
            outputs,
            lock_time,
            hash: Cached::new(),
        }
    }

    /// The txid of this transaction.
    ///
    /// Deserialized transactions carry a cached id; hand-built transactions
    /// serialize on demand to compute it.
    pub fn hash(&self) -> Hash {
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        Hash::from(self)
    }

    pub(crate) fn cache_hash(&mut self) {
        let own_hash = Hash::from(&*self);
        self.hash = Cached::from(own_hash);
    }

    /// Returns `true` if this transaction is a coinbase transaction: a
    /// single input spending the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && matches!(self.inputs.first(), Some(Input::Coinbase { .. }))
    }

    /// Returns `true` if any input is a coinbase input, regardless of
    /// position. Used to reject coinbase inputs smuggled into ordinary
    /// transactions.
    pub fn contains_coinbase_input(&self) -> bool {
        self.inputs
            .iter()
            .any(|input| matches!(input, Input::Coinbase { .. }))
    }

    /// The serialized length (in bytes) of this transaction.
    pub fn serialized_size(&self) -> usize {
        let mut size = 4 + CompactInt::size(self.inputs.len());
        for input in self.inputs.iter() {
            size += input.serialized_size();
        }
        size += CompactInt::size(self.outputs.len());
        for output in self.outputs.iter() {
            size += output.serialized_size();
        }
        size + 4
    }
}
