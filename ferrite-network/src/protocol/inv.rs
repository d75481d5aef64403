//! Inventory items: typed hashes advertising or requesting data.

use std::io::{Read, Write};

use ferrite_chain::{
    block,
    serialization::{SerializationError, WireDeserialize, WireSerialize},
    transaction,
};

/// An inventory hash which refers to some advertised or requested data.
///
/// On the wire this is a u32 kind code followed by the 32-byte hash.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InventoryHash {
    /// A hash of a transaction.
    Tx(transaction::Hash),
    /// A hash of a block.
    Block(block::Hash),
}

impl InventoryHash {
    /// The raw 32 hash bytes, regardless of kind.
    pub fn bytes(&self) -> [u8; 32] {
        match self {
            InventoryHash::Tx(hash) => hash.0,
            InventoryHash::Block(hash) => hash.0,
        }
    }
}

impl From<transaction::Hash> for InventoryHash {
    fn from(hash: transaction::Hash) -> InventoryHash {
        InventoryHash::Tx(hash)
    }
}

impl From<block::Hash> for InventoryHash {
    fn from(hash: block::Hash) -> InventoryHash {
        InventoryHash::Block(hash)
    }
}

impl WireSerialize for InventoryHash {
    fn wire_serialize<W: Write>(&self, mut writer: W) -> Result<(), std::io::Error> {
        let (code, bytes) = match *self {
            InventoryHash::Tx(hash) => (1u32, hash.0),
            InventoryHash::Block(hash) => (2u32, hash.0),
        };
        code.wire_serialize(&mut writer)?;
        bytes.wire_serialize(&mut writer)
    }
}

impl WireDeserialize for InventoryHash {
    fn wire_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let code = u32::wire_deserialize(&mut reader)?;
        let bytes = <[u8; 32]>::wire_deserialize(&mut reader)?;
        match code {
            1 => Ok(InventoryHash::Tx(transaction::Hash(bytes))),
            2 => Ok(InventoryHash::Block(block::Hash(bytes))),
            _ => Err(SerializationError::Parse("invalid inventory code")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_roundtrip() {
        let items = vec![
            InventoryHash::Tx(transaction::Hash([0x11; 32])),
            InventoryHash::Block(block::Hash([0x22; 32])),
        ];
        let data = items.wire_serialize_to_vec().unwrap();
        let other: Vec<InventoryHash> = Vec::wire_deserialize(data.as_slice()).unwrap();
        assert_eq!(items, other);
    }

    #[test]
    fn unknown_codes_are_rejected() {
        let mut data = Vec::new();
        9u32.wire_serialize(&mut data).unwrap();
        [0u8; 32].wire_serialize(&mut data).unwrap();
        assert!(InventoryHash::wire_deserialize(data.as_slice()).is_err());
    }
}
