use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use std::io;
use std::sync::Arc;

use super::{CompactInt, SerializationError};

type Result<R> = std::result::Result<R, SerializationError>;

/// A type that can be deserialized from the canonical wire format.
pub trait WireDeserialize {
    /// Read a value of this type from `reader`.
    ///
    /// Truncated input surfaces as an [`io::ErrorKind::UnexpectedEof`] error
    /// wrapped in [`SerializationError::Io`].
    fn wire_deserialize<R: io::Read>(reader: R) -> Result<Self>
    where
        Self: Sized;
}

/// Helper for deserializing more succinctly via type inference.
pub trait WireDeserializeInto {
    /// Deserialize based on type inference.
    fn wire_deserialize_into<T>(self) -> Result<T>
    where
        T: WireDeserialize;
}

impl<R: io::Read> WireDeserializeInto for R {
    fn wire_deserialize_into<T>(self) -> Result<T>
    where
        T: WireDeserialize,
    {
        T::wire_deserialize(self)
    }
}

impl WireDeserialize for u8 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<u8> {
        Ok(reader.read_u8()?)
    }
}

impl WireDeserialize for u16 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<u16> {
        Ok(reader.read_u16::<LittleEndian>()?)
    }
}

impl WireDeserialize for u32 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<u32> {
        Ok(reader.read_u32::<LittleEndian>()?)
    }
}

impl WireDeserialize for u64 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<u64> {
        Ok(reader.read_u64::<LittleEndian>()?)
    }
}

impl WireDeserialize for i32 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<i32> {
        Ok(reader.read_i32::<LittleEndian>()?)
    }
}

impl WireDeserialize for i64 {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<i64> {
        Ok(reader.read_i64::<LittleEndian>()?)
    }
}

impl WireDeserialize for DateTime<Utc> {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<DateTime<Utc>> {
        let seconds = reader.read_u32::<LittleEndian>()?;
        Utc.timestamp_opt(i64::from(seconds), 0)
            .single()
            .ok_or(SerializationError::Parse("invalid timestamp"))
    }
}

impl<T> WireDeserialize for Vec<T>
where
    T: WireDeserialize,
{
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Vec<T>> {
        let len = CompactInt::wire_deserialize(&mut reader)?.value() as usize;
        // Blind preallocation from an attacker-supplied count is a DoS
        // vector, so the initial reservation is capped.
        let blind_alloc_limit = 1024;
        let mut result: Vec<T> = Vec::with_capacity(std::cmp::min(len, blind_alloc_limit));
        for _ in 0..len {
            result.push(T::wire_deserialize(&mut reader)?);
        }
        Ok(result)
    }
}

impl<T> WireDeserialize for Arc<T>
where
    T: WireDeserialize,
{
    fn wire_deserialize<R: io::Read>(reader: R) -> Result<Self> {
        Ok(Arc::new(T::wire_deserialize(reader)?))
    }
}

macro_rules! impl_deserialize_byte_array {
    ($size:expr) => {
        impl WireDeserialize for [u8; $size] {
            fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<[u8; $size]> {
                let mut result = [0u8; $size];
                reader.read_exact(&mut result)?;
                Ok(result)
            }
        }
    };
}

impl_deserialize_byte_array!(4);
impl_deserialize_byte_array!(12);
impl_deserialize_byte_array!(32);
