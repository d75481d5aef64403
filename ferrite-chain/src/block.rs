//! Blocks and block-related structures (heights, headers, merkle roots).

mod hash;
mod header;
mod height;
mod serialize;

pub mod merkle;


use std::{fmt, sync::Arc};

pub use hash::Hash;
pub use header::Header;
pub use height::Height;
pub use serialize::MAX_BLOCK_BYTES;

use serde::{Deserialize, Serialize};

use crate::{fmt::DisplayToDebug, transaction, transaction::Transaction};

/// A block, containing a header and the transactions it commits to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// The block header, containing block metadata.
    pub header: Header,
    /// The block transactions; the first is the coinbase.
    pub transactions: Vec<Arc<Transaction>>,
}

impl Block {
    /// Compute the hash of this block.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Return the block height encoded in the coinbase data, if any.
    ///
    /// Miners push the height as a 4-byte little-endian value at the front
    /// of the coinbase data; blocks from other builders may omit it.
    pub fn coinbase_height(&self) -> Option<Height> {
        let data = match self.transactions.first()?.inputs.first()? {
            transaction::Input::Coinbase { data, .. } => data.as_ref(),
            transaction::Input::PrevOut { .. } => return None,
        };
        // A direct 4-byte push followed by the little-endian height.
        if data.len() < 5 || data[0] != 4 {
            return None;
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&data[1..5]);
        Some(Height(u32::from_le_bytes(raw)))
    }

    /// The hashes of this block's transactions, in block order.
    pub fn transaction_hashes(&self) -> impl Iterator<Item = transaction::Hash> + '_ {
        self.transactions.iter().map(|tx| tx.hash())
    }

    /// Recompute the merkle root of this block's transactions.
    pub fn merkle_root(&self) -> merkle::Root {
        self.transaction_hashes().collect()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fmter = f.debug_struct("Block");
        if let Some(height) = self.coinbase_height() {
            fmter.field("height", &height);
        }
        fmter.field("hash", &DisplayToDebug(self.hash())).finish()
    }
}

impl<'a> From<&'a Block> for Hash {
    fn from(block: &'a Block) -> Hash {
        (&block.header).into()
    }
}
