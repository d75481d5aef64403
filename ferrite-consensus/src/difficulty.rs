//! Difficulty retargeting.

use primitive_types::U256;

use ferrite_chain::{
    parameters::{pow_limit, POW_LIMIT_BITS, RETARGET_INTERVAL, TARGET_TIMESPAN},
    work::difficulty::{CompactDifficulty, ExpandedDifficulty},
};
use ferrite_state::BlockIndex;

/// The difficulty required of the next block.
///
/// Off retarget boundaries this is simply the tip's own difficulty. Every
/// [`RETARGET_INTERVAL`] blocks, the target is rescaled by how long the
/// last interval actually took, clamped to a factor of four in either
/// direction, and never easier than the proof-of-work limit.
pub fn next_work_required(index: &BlockIndex) -> CompactDifficulty {
    let tip = match index.tip() {
        Some(tip) => tip,
        None => return POW_LIMIT_BITS,
    };
    let tip_node = index.node(tip);

    if tip_node.height.0 == 0 || tip_node.height.0 % RETARGET_INTERVAL != 0 {
        return tip_node.block.header.difficulty_threshold;
    }

    let first = match index.ancestor(tip, RETARGET_INTERVAL) {
        Some(first) => index.node(first),
        None => return POW_LIMIT_BITS,
    };

    let actual_timespan = (tip_node.block.header.time - first.block.header.time).num_seconds();
    let actual_timespan = actual_timespan.clamp(TARGET_TIMESPAN / 4, TARGET_TIMESPAN * 4);

    let old_target = match tip_node.block.header.difficulty_threshold.to_expanded() {
        Some(target) => target,
        None => return POW_LIMIT_BITS,
    };

    // old_target is at most ~2^224 and the clamped timespan fits in 23
    // bits, so the product cannot overflow 256 bits.
    let new_target =
        old_target.to_u256() * U256::from(actual_timespan as u64) / U256::from(TARGET_TIMESPAN as u64);
    let new_target = new_target.min(pow_limit().to_u256());

    ExpandedDifficulty::from_u256(new_target).to_compact()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use ferrite_chain::{
        amount::Amount,
        block::{merkle, Block, Header},
        script::Script,
        transaction::{CoinbaseData, Input, LockTime, Output, Transaction},
    };

    use super::*;

    const EASY_BITS: CompactDifficulty = CompactDifficulty(0x207fffff);
    /// Bits below the proof-of-work limit, so rescaling has headroom.
    const FIRM_BITS: CompactDifficulty = CompactDifficulty(0x1c7fffff);

    /// Chain of `length` headers with `spacing` seconds between them. No
    /// proof of work needed; the index does not check it.
    fn chain_with_spacing(length: u32, spacing: i64, bits: CompactDifficulty) -> BlockIndex {
        let mut index = BlockIndex::new();
        let mut parent = None;
        for height in 0..length {
            let transactions = vec![Arc::new(Transaction::new(
                1,
                vec![Input::Coinbase {
                    data: CoinbaseData(height.to_le_bytes().to_vec()),
                    sequence: Input::FINAL_SEQUENCE,
                }],
                vec![Output {
                    value: Amount::from_sats(1),
                    lock_script: Script::empty(),
                }],
                LockTime::unlocked(),
            ))];
            let merkle_root: merkle::Root = transactions.iter().map(|tx| tx.hash()).collect();
            let header = Header::new(
                1,
                parent.unwrap_or(ferrite_chain::parameters::GENESIS_PREVIOUS_BLOCK_HASH),
                merkle_root,
                Utc.timestamp_opt(1_600_000_000 + i64::from(height) * spacing, 0)
                    .unwrap(),
                bits,
                0,
            );
            let block = Arc::new(Block {
                header,
                transactions,
            });
            parent = Some(block.hash());
            index.insert(block).expect("chain builds in order");
        }
        index
    }

    #[test]
    fn an_empty_index_gets_the_pow_limit() {
        assert_eq!(next_work_required(&BlockIndex::new()), POW_LIMIT_BITS);
    }

    #[test]
    fn off_boundary_heights_inherit_the_parent_bits() {
        let index = chain_with_spacing(10, 600, EASY_BITS);
        assert_eq!(next_work_required(&index), EASY_BITS);
    }

    #[test]
    fn a_fast_interval_tightens_the_target() {
        // Tip at height 2016 with 300-second spacing: the interval took
        // half the target timespan, so the target halves.
        let index = chain_with_spacing(RETARGET_INTERVAL + 1, 300, FIRM_BITS);
        let next = next_work_required(&index);

        let old_target = FIRM_BITS.to_expanded().unwrap().to_u256();
        let expected = ExpandedDifficulty::from_u256(old_target / 2).to_compact();
        assert_eq!(next, expected);
        assert_ne!(next, FIRM_BITS);
    }

    #[test]
    fn a_slow_interval_is_clamped_to_the_pow_limit() {
        // 4000-second spacing overshoots the 4x clamp, and quadrupling an
        // already-easy target runs into the proof-of-work limit.
        let index = chain_with_spacing(RETARGET_INTERVAL + 1, 4000, EASY_BITS);
        assert_eq!(next_work_required(&index), POW_LIMIT_BITS);
    }
}
