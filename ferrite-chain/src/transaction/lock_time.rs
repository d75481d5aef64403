use std::io;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::block;
use crate::serialization::{SerializationError, WireDeserialize, WireSerialize};

/// A transaction locktime: the earliest block height or wall-clock time at
/// which the transaction may be committed to the chain.
///
/// The wire format is a single u32; raw values below [`LockTime::MIN_TIMESTAMP`]
/// encode heights, values at or above it encode Unix times.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum LockTime {
    /// Unlocked once the chain reaches this height.
    Height(block::Height),
    /// Unlocked once this time has passed.
    Time(DateTime<Utc>),
}

impl LockTime {
    /// The lowest raw value interpreted as a timestamp rather than a height.
    pub const MIN_TIMESTAMP: u32 = 500_000_000;

    /// A locktime that imposes no constraint.
    pub const fn unlocked() -> LockTime {
        LockTime::Height(block::Height(0))
    }

    /// Whether this locktime imposes no constraint (raw value zero).
    pub fn is_unlocked(&self) -> bool {
        matches!(self, LockTime::Height(block::Height(0)))
    }
}

impl Default for LockTime {
    fn default() -> Self {
        LockTime::unlocked()
    }
}

impl WireSerialize for LockTime {
    fn wire_serialize<W: io::Write>(&self, writer: W) -> Result<(), io::Error> {
        match self {
            LockTime::Height(height) => height.0.wire_serialize(writer),
            LockTime::Time(time) => (time.timestamp() as u32).wire_serialize(writer),
        }
    }
}

impl WireDeserialize for LockTime {
    fn wire_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        let raw = u32::wire_deserialize(reader)?;
        if raw < LockTime::MIN_TIMESTAMP {
            Ok(LockTime::Height(block::Height(raw)))
        } else {
            Utc.timestamp_opt(i64::from(raw), 0)
                .single()
                .map(LockTime::Time)
                .ok_or(SerializationError::Parse("invalid locktime timestamp"))
        }
    }
}
