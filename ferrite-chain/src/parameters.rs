//! Chain-wide consensus parameters.

use crate::{
    amount::Amount,
    block,
    work::difficulty::{CompactDifficulty, ExpandedDifficulty},
};

/// The previous block hash for the genesis block: the null hash.
pub const GENESIS_PREVIOUS_BLOCK_HASH: block::Hash = block::Hash([0; 32]);

/// The easiest permitted difficulty, in compact form. This is also the
/// difficulty of the genesis block.
pub const POW_LIMIT_BITS: CompactDifficulty = CompactDifficulty(0x1d00ffff);

/// The easiest permitted difficulty as a full target.
pub fn pow_limit() -> ExpandedDifficulty {
    POW_LIMIT_BITS
        .to_expanded()
        .expect("the proof-of-work limit is a valid compact value")
}

/// The block subsidy, in satoshis. Fixed: this chain has no halving
/// schedule.
pub const BLOCK_SUBSIDY: Amount = Amount::from_sats(5_000_000_000);

/// The number of confirmations a coinbase output needs before it may be
/// spent.
pub const COINBASE_MATURITY: u32 = 100;

/// The number of blocks between difficulty adjustments.
pub const RETARGET_INTERVAL: u32 = 2016;

/// The intended wall-clock span of one retarget interval, in seconds.
pub const TARGET_TIMESPAN: i64 = 14 * 24 * 60 * 60;

/// How far into the future a header time may be, relative to the local
/// clock, in seconds.
pub const MAX_FUTURE_BLOCK_TIME: i64 = 2 * 60 * 60;

/// The deepest reorganization the node supports; bounds the UTXO spent
/// cache.
pub const MAX_REORG_DEPTH: u32 = 100;

/// The number of headers considered by the median-time-past rule.
pub const MEDIAN_TIME_SPAN: usize = 11;

/// Bounds on the coinbase data length, inclusive.
pub const COINBASE_DATA_RANGE: std::ops::RangeInclusive<usize> = 2..=100;
