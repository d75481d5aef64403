//! Block difficulty: the compact "bits" encoding, expanded 256-bit targets,
//! and the work metric that orders competing chains.
//!
//! Note: the comparisons in this module are u256 integer comparisons.
//! Greater targets represent *less* work.

use std::{
    cmp::Ordering,
    fmt, io,
    ops::{Add, AddAssign},
};

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::block;
use crate::serialization::{SerializationError, WireDeserialize, WireSerialize};

/// A difficulty target in compact ("bits") form.
///
/// The top byte is a base-256 exponent and the low three bytes are a
/// mantissa: `target = mantissa * 256^(exponent - 3)`. The encoding is
/// inherited from Bitcoin's `nBits` header field.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompactDifficulty(pub u32);

/// A difficulty target as a full 256-bit unsigned integer.
///
/// A header satisfies proof of work when its hash, read as a big-endian
/// 256-bit integer, is less than or equal to this target.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExpandedDifficulty(U256);

/// The proof of work represented by a single target, or accumulated along a
/// chain: `floor(2^256 / (target + 1))`.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Work(U256);

impl CompactDifficulty {
    /// Expand this compact value into a full 256-bit target.
    ///
    /// Returns `None` for encodings that expand to zero (a zero mantissa, or
    /// an exponent that shifts every mantissa bit out of range); no block
    /// hash can satisfy such a target. Expansion is clamped to 256 bits.
    pub fn to_expanded(self) -> Option<ExpandedDifficulty> {
        let exponent = self.0 >> 24;
        // The sign bit of the mantissa is masked off; negative targets do
        // not occur in valid encodings.
        let mantissa = self.0 & 0x007f_ffff;
        if mantissa == 0 {
            return None;
        }

        let target = if exponent <= 3 {
            U256::from(mantissa >> (8 * (3 - exponent)))
        } else {
            let shift = 8 * (exponent - 3) as usize;
            if shift >= 256 {
                U256::zero()
            } else {
                U256::from(mantissa) << shift
            }
        };

        if target.is_zero() {
            None
        } else {
            Some(ExpandedDifficulty(target))
        }
    }
}

impl ExpandedDifficulty {
    /// Wrap a raw 256-bit target.
    pub fn from_u256(target: U256) -> ExpandedDifficulty {
        ExpandedDifficulty(target)
    }

    /// The raw 256-bit target.
    pub fn to_u256(self) -> U256 {
        self.0
    }

    /// Compress this target into compact form.
    ///
    /// Picks the minimal exponent with a mantissa below 2^23; if the
    /// mantissa's high bit would be set after truncation, it is shifted down
    /// a byte and the exponent incremented. `to_compact` then `to_expanded`
    /// round-trips exactly over the set of compact values this function
    /// emits.
    pub fn to_compact(self) -> CompactDifficulty {
        let target = self.0;
        if target.is_zero() {
            return CompactDifficulty(0);
        }

        let mut size = (target.bits() + 7) / 8;
        let mut mantissa = if size <= 3 {
            (target.low_u64() << (8 * (3 - size))) as u32
        } else {
            (target >> (8 * (size - 3))).low_u64() as u32
        };
        if mantissa & 0x0080_0000 != 0 {
            mantissa >>= 8;
            size += 1;
        }

        CompactDifficulty(((size as u32) << 24) | (mantissa & 0x007f_ffff))
    }

    /// The work proved by a hash at exactly this target.
    pub fn to_work(self) -> Work {
        let target = self.0;
        if target == U256::MAX {
            return Work(U256::one());
        }
        // floor(2^256 / (target + 1)) == floor(!target / (target + 1)) + 1,
        // which avoids widening past 256 bits.
        Work((!target / (target + U256::one())) + U256::one())
    }
}

impl Work {
    /// Zero accumulated work.
    pub const fn zero() -> Work {
        Work(U256::zero())
    }
}

impl Add for Work {
    type Output = Work;

    fn add(self, rhs: Work) -> Work {
        Work(self.0 + rhs.0)
    }
}

impl AddAssign for Work {
    fn add_assign(&mut self, rhs: Work) {
        self.0 += rhs.0;
    }
}

impl PartialEq<block::Hash> for ExpandedDifficulty {
    fn eq(&self, other: &block::Hash) -> bool {
        self.0 == U256::from_big_endian(&other.0)
    }
}

impl PartialOrd<block::Hash> for ExpandedDifficulty {
    fn partial_cmp(&self, other: &block::Hash) -> Option<Ordering> {
        self.0.partial_cmp(&U256::from_big_endian(&other.0))
    }
}

impl PartialEq<ExpandedDifficulty> for block::Hash {
    fn eq(&self, other: &ExpandedDifficulty) -> bool {
        other == self
    }
}

impl PartialOrd<ExpandedDifficulty> for block::Hash {
    fn partial_cmp(&self, other: &ExpandedDifficulty) -> Option<Ordering> {
        U256::from_big_endian(&self.0).partial_cmp(&other.0)
    }
}

impl fmt::Debug for CompactDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("CompactDifficulty")
            .field(&format_args!("{:#010x}", self.0))
            .finish()
    }
}

impl fmt::Debug for ExpandedDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        f.debug_tuple("ExpandedDifficulty")
            .field(&hex::encode(bytes))
            .finish()
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Work").field(&self.0).finish()
    }
}

impl WireSerialize for CompactDifficulty {
    fn wire_serialize<W: io::Write>(&self, writer: W) -> Result<(), io::Error> {
        self.0.wire_serialize(writer)
    }
}

impl WireDeserialize for CompactDifficulty {
    fn wire_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(CompactDifficulty(u32::wire_deserialize(reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow_limit_expansion() {
        let target = CompactDifficulty(0x1d00ffff)
            .to_expanded()
            .expect("the genesis bits are valid");
        let mut bytes = [0u8; 32];
        target.to_u256().to_big_endian(&mut bytes);
        assert_eq!(
            hex::encode(bytes),
            "00000000ffff0000000000000000000000000000000000000000000000000000",
        );
    }

    #[test]
    fn compact_roundtrip_over_emitted_values() {
        // Every value here is in minimal form, i.e. something to_compact
        // itself can emit.
        for bits in [0x1d00ffffu32, 0x207fffff, 0x1b0404cb, 0x04123456, 0x1c2abcde] {
            let expanded = CompactDifficulty(bits)
                .to_expanded()
                .expect("test values are valid");
            assert_eq!(expanded.to_compact(), CompactDifficulty(bits));
        }
    }

    #[test]
    fn expansion_rejects_zero_mantissa() {
        assert!(CompactDifficulty(0x1d000000).to_expanded().is_none());
        assert!(CompactDifficulty(0).to_expanded().is_none());
    }

    #[test]
    fn work_of_known_targets() {
        let limit = CompactDifficulty(0x1d00ffff).to_expanded().unwrap();
        assert_eq!(limit.to_work(), Work(U256::from(0x1_0001_0001u64)));

        let easy = CompactDifficulty(0x207fffff).to_expanded().unwrap();
        assert_eq!(easy.to_work(), Work(U256::from(2u64)));
    }

    #[test]
    fn harder_targets_have_more_work() {
        let limit = CompactDifficulty(0x1d00ffff).to_expanded().unwrap();
        let easy = CompactDifficulty(0x207fffff).to_expanded().unwrap();
        assert!(limit.to_work() > easy.to_work());

        let mut total = Work::zero();
        total += easy.to_work();
        total += easy.to_work();
        assert_eq!(total, Work(U256::from(4u64)));
    }

    #[test]
    fn hash_to_target_ordering() {
        let target = CompactDifficulty(0x1d00ffff).to_expanded().unwrap();

        let mut low = [0u8; 32];
        low[31] = 1;
        assert!(block::Hash(low) < target);

        let high = [0xffu8; 32];
        assert!(block::Hash(high) > target);

        // Equality at the boundary counts as meeting the target.
        let mut boundary = [0u8; 32];
        target.to_u256().to_big_endian(&mut boundary);
        assert!(block::Hash(boundary) <= target);
    }
}
