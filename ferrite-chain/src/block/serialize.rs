//! Wire-format impls for headers and blocks.

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    cached::Cached,
    serialization::{
        sha256d, CompactInt, SerializationError, WireDeserialize, WireSerialize,
    },
    transaction::Transaction,
    work::difficulty::CompactDifficulty,
};

use super::{merkle, Block, Hash, Header};

/// The maximum serialized size of a block, in bytes. This is a
/// deserialization guard, not a consensus rule.
pub const MAX_BLOCK_BYTES: u64 = 4_000_000;

/// A lower bound on the serialized size of any transaction, used to sanity
/// check attacker-supplied transaction counts before allocation.
const MIN_TX_BYTES: u64 = 60;

impl WireSerialize for Header {
    fn wire_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.version.wire_serialize(&mut writer)?;
        self.previous_block_hash.wire_serialize(&mut writer)?;
        self.merkle_root.wire_serialize(&mut writer)?;
        self.time.wire_serialize(&mut writer)?;
        self.difficulty_threshold.wire_serialize(&mut writer)?;
        self.nonce.wire_serialize(&mut writer)
    }
}

impl WireDeserialize for Header {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        // Read the 80 header bytes up front so the hash can be computed
        // without reserializing.
        let mut raw = [0u8; Header::LEN];
        reader.read_exact(&mut raw)?;
        let own_hash = Hash(sha256d::hash(&raw));

        let mut cursor = io::Cursor::new(&raw[..]);
        Ok(Header {
            version: i32::wire_deserialize(&mut cursor)?,
            previous_block_hash: Hash::wire_deserialize(&mut cursor)?,
            merkle_root: merkle::Root::wire_deserialize(&mut cursor)?,
            time: <DateTime<Utc>>::wire_deserialize(&mut cursor)?,
            difficulty_threshold: CompactDifficulty::wire_deserialize(&mut cursor)?,
            nonce: u32::wire_deserialize(&mut cursor)?,
            hash: Cached::from(own_hash),
        })
    }
}

impl WireSerialize for Block {
    fn wire_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.header.wire_serialize(&mut writer)?;
        self.transactions.wire_serialize(&mut writer)
    }
}

impl WireDeserialize for Block {
    fn wire_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        let mut reader = reader.take(MAX_BLOCK_BYTES);
        let header = Header::wire_deserialize(&mut reader)?;

        let tx_count = CompactInt::wire_deserialize(&mut reader)?.value();
        // A count that could not possibly fit in a maximum-size block is
        // rejected before any per-transaction allocation happens.
        if tx_count > MAX_BLOCK_BYTES / MIN_TX_BYTES {
            return Err(SerializationError::Parse(
                "block transaction count exceeds maximum block size",
            ));
        }
        let mut transactions = Vec::with_capacity(
            tx_count
                .try_into()
                .expect("tx count bounded by MAX_BLOCK_BYTES fits in usize"),
        );
        for _ in 0..tx_count {
            transactions.push(<Arc<Transaction>>::wire_deserialize(&mut reader)?);
        }

        Ok(Block {
            header,
            transactions,
        })
    }
}
