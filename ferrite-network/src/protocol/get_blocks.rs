//! The GETBLOCKS payload: a locator negotiating the fork point with a
//! peer.

use ferrite_chain::{
    block,
    serialization::{SerializationError, WireDeserialize, WireSerialize},
};

/// A request for the inventory of blocks following a fork point.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GetBlocks {
    /// The sender's known block hashes, newest first, thinning out with
    /// distance from its tip. The first hash the receiver recognizes is
    /// the fork point.
    pub known_blocks: Vec<block::Hash>,
    /// The last hash to list. `None` (all zeroes on the wire) asks for as
    /// many as the receiver will send.
    pub stop_hash: Option<block::Hash>,
}

impl WireDeserialize for GetBlocks {
    fn wire_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let known_blocks = Vec::wire_deserialize(&mut reader)?;
        let raw_stop_hash = block::Hash::wire_deserialize(&mut reader)?;
        let stop_hash = if raw_stop_hash.0 == [0u8; 32] {
            None
        } else {
            Some(raw_stop_hash)
        };
        Ok(GetBlocks {
            known_blocks,
            stop_hash,
        })
    }
}

impl WireSerialize for GetBlocks {
    fn wire_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.known_blocks.wire_serialize(&mut target)?;
        match self.stop_hash {
            Some(hash) => hash.wire_serialize(&mut target),
            None => [0u8; 32].wire_serialize(&mut target),
        }
    }
}
