use byteorder::{LittleEndian, WriteBytesExt};

use super::{SerializationError, WireDeserialize, WireSerialize};

/// Bitcoin's variable-length integer ("compact size") encoding.
///
/// Values below `0xFD` occupy a single byte; larger values get a one-byte
/// prefix (`0xFD`/`0xFE`/`0xFF`) followed by a 2/4/8-byte little-endian
/// payload. The encoder always emits the minimal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactInt(u64);

impl CompactInt {
    /// Wrap a length as a compact integer.
    pub fn from(value: usize) -> CompactInt {
        CompactInt(value as u64)
    }

    /// The wrapped value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The number of bytes `value` occupies once encoded.
    pub fn size(value: usize) -> usize {
        if value < 0xFD {
            1
        } else if value <= 0xFFFF {
            3
        } else if value <= 0xFFFF_FFFF {
            5
        } else {
            9
        }
    }
}

impl WireSerialize for CompactInt {
    fn wire_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        if self.0 < 0xFD {
            target.write_all(&[self.0 as u8])
        } else if self.0 <= 0xFFFF {
            target.write_all(&[0xFD])?;
            target.write_u16::<LittleEndian>(self.0 as u16)
        } else if self.0 <= 0xFFFF_FFFF {
            target.write_all(&[0xFE])?;
            target.write_u32::<LittleEndian>(self.0 as u32)
        } else {
            target.write_all(&[0xFF])?;
            target.write_u64::<LittleEndian>(self.0)
        }
    }
}

impl WireDeserialize for CompactInt {
    fn wire_deserialize<R: std::io::Read>(mut reader: R) -> Result<CompactInt, SerializationError> {
        let first = u8::wire_deserialize(&mut reader)?;
        match first {
            0xFD => Ok(CompactInt(u16::wire_deserialize(&mut reader)? as u64)),
            0xFE => Ok(CompactInt(u32::wire_deserialize(&mut reader)? as u64)),
            0xFF => Ok(CompactInt(u64::wire_deserialize(&mut reader)?)),
            _ => Ok(CompactInt(first as u64)),
        }
    }
}
