//! Consensus-critical serialization.
//!
//! This module contains two traits: [`WireSerialize`] and [`WireDeserialize`],
//! analogs of the Serde `Serialize` and `Deserialize` traits but intended for
//! the consensus-critical wire format (little-endian integers, compact-size
//! prefixed collections, raw byte arrays). Canonical encodings are bit-exact:
//! `wire_serialize(wire_deserialize(bytes)) == bytes` for every canonically
//! encoded input.

mod compact;
mod deserialize;
mod error;

pub mod sha256d;

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use compact::CompactInt;
pub use deserialize::{WireDeserialize, WireDeserializeInto};
pub use error::SerializationError;

/// A type that can be serialized into the canonical wire format.
pub trait WireSerialize {
    /// Write `self` into `target` in the canonical wire format.
    fn wire_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error>;

    /// Serialize `self` into a freshly allocated byte vector.
    fn wire_serialize_to_vec(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut data = Vec::new();
        self.wire_serialize(&mut data)?;
        Ok(data)
    }
}

/// Deserialize a value and require the input to be fully consumed.
///
/// Ingestion paths for whole blocks and transactions use this instead of the
/// plain trait method: trailing garbage after a valid encoding is an error,
/// not an extension point.
pub fn wire_deserialize_exact<T: WireDeserialize>(bytes: &[u8]) -> Result<T, SerializationError> {
    let mut cursor = std::io::Cursor::new(bytes);
    let value = T::wire_deserialize(&mut cursor)?;
    if (cursor.position() as usize) < bytes.len() {
        return Err(SerializationError::TrailingBytes);
    }
    Ok(value)
}

impl WireSerialize for u16 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u16::<LittleEndian>(*self)
    }
}

impl WireSerialize for u32 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u32::<LittleEndian>(*self)
    }
}

impl WireSerialize for u64 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u64::<LittleEndian>(*self)
    }
}

impl WireSerialize for i32 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i32::<LittleEndian>(*self)
    }
}

impl WireSerialize for i64 {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i64::<LittleEndian>(*self)
    }
}

impl WireSerialize for DateTime<Utc> {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        // Header timestamps are u32 seconds; out-of-range times saturate.
        let time_u32 = u32::try_from(self.timestamp()).unwrap_or(u32::MAX);
        target.write_u32::<LittleEndian>(time_u32)
    }
}

impl WireSerialize for [u8; 4] {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WireSerialize for [u8; 12] {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WireSerialize for [u8; 32] {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl WireSerialize for Vec<u8> {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).wire_serialize(&mut target)?;
        target.write_all(self)
    }
}

impl<T> WireSerialize for Vec<T>
where
    T: WireSerialize,
{
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).wire_serialize(&mut target)?;
        for item in self.iter() {
            item.wire_serialize(&mut target)?;
        }
        Ok(())
    }
}

impl<T> WireSerialize for Arc<T>
where
    T: WireSerialize,
{
    fn wire_serialize<W: std::io::Write>(&self, writer: W) -> Result<(), std::io::Error> {
        T::wire_serialize(self, writer)
    }
}
