//! The raw script type.
//!
//! A script is an opaque byte sequence at this layer. Parsing the bytes into
//! opcodes and executing them belongs to the script crate; outputs and inputs
//! only need the encoding.

use std::{
    fmt,
    io::{self, Read},
};

use serde::{Deserialize, Serialize};

use crate::serialization::{CompactInt, SerializationError, WireDeserialize, WireSerialize};

/// An encoding of a locking or unlocking script.
#[derive(Clone, Default, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct Script(pub Vec<u8>);

impl Script {
    /// Wrap raw script bytes.
    pub fn new(bytes: Vec<u8>) -> Script {
        Script(bytes)
    }

    /// An empty script.
    pub fn empty() -> Script {
        Script(Vec::new())
    }

    /// The raw bytes of this script.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The script length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the script is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The encoded length: compact-size prefix plus the raw bytes.
    pub fn serialized_size(&self) -> usize {
        CompactInt::size(self.0.len()) + self.0.len()
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Script").field(&hex::encode(&self.0)).finish()
    }
}

impl WireSerialize for Script {
    fn wire_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        CompactInt::from(self.0.len()).wire_serialize(&mut writer)?;
        writer.write_all(&self.0[..])
    }
}

impl WireDeserialize for Script {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = CompactInt::wire_deserialize(&mut reader)?.value();
        let mut bytes = Vec::new();
        reader.take(len).read_to_end(&mut bytes)?;
        if (bytes.len() as u64) < len {
            return Err(SerializationError::Parse("truncated script"));
        }
        Ok(Script(bytes))
    }
}
