use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{cached::Cached, work::difficulty::CompactDifficulty};

use super::{merkle, Hash};

/// A block header, containing metadata about a block.
///
/// Blocks are chained together via the backwards reference (previous header
/// hash) present in the header: each block points to its parent, all the way
/// back to the genesis block.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// The block's version field.
    pub version: i32,

    /// The hash of the previous block. This ensures no previous block can
    /// be changed without also changing this header.
    pub previous_block_hash: Hash,

    /// The root of the transaction merkle tree, binding the header to the
    /// transactions in the block.
    pub merkle_root: merkle::Root,

    /// The Unix epoch time (UTC) when the miner started hashing the header,
    /// according to the miner.
    pub time: DateTime<Utc>,

    /// The compact-encoded target threshold this header's hash must not
    /// exceed.
    pub difficulty_threshold: CompactDifficulty,

    /// An arbitrary field miners sweep to produce a hash below the target.
    pub nonce: u32,

    /// Memoized header hash, populated during deserialization. Not part of
    /// the consensus serialization.
    pub(super) hash: Cached<Hash>,
}

impl Header {
    /// The serialized length of a header, in bytes.
    pub const LEN: usize = 80;

    /// Assemble a header from its consensus fields.
    pub fn new(
        version: i32,
        previous_block_hash: Hash,
        merkle_root: merkle::Root,
        time: DateTime<Utc>,
        difficulty_threshold: CompactDifficulty,
        nonce: u32,
    ) -> Header {
        Header {
            version,
            previous_block_hash,
            merkle_root,
            time,
            difficulty_threshold,
            nonce,
            hash: Cached::new(),
        }
    }

    /// The hash of this header.
    ///
    /// Headers that came off the wire carry a cached hash; hand-built
    /// headers (e.g. mining candidates, whose nonce is still changing)
    /// serialize on demand.
    pub fn hash(&self) -> Hash {
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        Hash::from(self)
    }
}
