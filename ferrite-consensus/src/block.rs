//! Block checks.
//!
//! Split along the contextual boundary: [`check_standalone`] covers
//! everything a block can prove about itself (version, time, proof of work,
//! merkle commitment, coinbase placement), while [`check_transactions`]
//! needs a UTXO view and a height, so it runs when the block actually
//! connects — which, for a reorganization, may be long after the block was
//! first seen.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use ferrite_chain::{
    amount::Amount,
    block::{self, Block, Height},
    parameters::{BLOCK_SUBSIDY, MAX_FUTURE_BLOCK_TIME},
};
use ferrite_state::UtxoSet;

use crate::{error::BlockError, transaction as tx_check, view::BlockOverlay};

/// Context-free validation: header sanity, proof of work, merkle
/// commitment, and coinbase placement.
pub fn check_standalone(block: &Block, now: DateTime<Utc>) -> Result<(), BlockError> {
    version_is_supported(&block.header)?;
    time_is_valid_at(&block.header, now)?;
    difficulty_is_valid(block)?;
    merkle_root_is_valid(block)?;
    coinbase_is_first(block)?;
    Ok(())
}

/// Contextual validation: the parent linkage plus the transaction batch
/// against `utxos`, as of `height`.
pub fn check_connectable(
    block: &Block,
    utxos: &UtxoSet,
    expected_prev_hash: block::Hash,
    height: Height,
    median_time_past: DateTime<Utc>,
) -> Result<(), BlockError> {
    if block.header.previous_block_hash != expected_prev_hash {
        return Err(BlockError::BadPrevHash {
            expected: expected_prev_hash,
            actual: block.header.previous_block_hash,
        });
    }
    check_transactions(block, utxos, height, median_time_past)
}

/// Returns `Ok(())` if the block version is supported.
fn version_is_supported(header: &block::Header) -> Result<(), BlockError> {
    if header.version < 1 {
        return Err(BlockError::BadVersion(header.version));
    }
    Ok(())
}

/// Returns `Ok(())` if `header.time` is no more than two hours past the
/// local clock. This is a non-deterministic rule: clocks vary between
/// nodes, and a block rejected now may be accepted later.
fn time_is_valid_at(header: &block::Header, now: DateTime<Utc>) -> Result<(), BlockError> {
    let horizon = now + Duration::seconds(MAX_FUTURE_BLOCK_TIME);
    if header.time > horizon {
        return Err(BlockError::TimeTooFar);
    }
    Ok(())
}

/// Returns `Ok(())` if the block hash is at or below the target its own
/// difficulty field encodes.
///
/// Note: the comparison is a u256 integer comparison over the raw digest
/// bytes read big-endian; greater values represent less work.
fn difficulty_is_valid(block: &Block) -> Result<(), BlockError> {
    let target = block
        .header
        .difficulty_threshold
        .to_expanded()
        .ok_or(BlockError::InvalidDifficulty)?;
    if block.hash() > target {
        return Err(BlockError::PowFailed);
    }
    Ok(())
}

/// Returns `Ok(())` if the header's merkle root matches a recomputation
/// from the transaction list, and no txid appears twice.
///
/// The duplicate check matters because the odd-level duplication rule makes
/// the tree malleable: a block with duplicated trailing transactions can
/// merkle-ize to the same root as one without (CVE-2012-2459), and
/// duplicate transactions imply a double spend anyway.
fn merkle_root_is_valid(block: &Block) -> Result<(), BlockError> {
    let computed = block.merkle_root();
    if computed != block.header.merkle_root {
        return Err(BlockError::BadMerkleRoot);
    }

    let hashes: HashSet<_> = block.transaction_hashes().collect();
    if hashes.len() != block.transactions.len() {
        return Err(BlockError::DuplicateTransaction);
    }
    Ok(())
}

/// Returns `Ok(())` if there is exactly one coinbase transaction in the
/// block and it is in the first position.
fn coinbase_is_first(block: &Block) -> Result<(), BlockError> {
    let first = block
        .transactions
        .first()
        .ok_or(BlockError::NoTransactions)?;
    if !first.is_coinbase() {
        return Err(BlockError::NoCoinbase);
    }
    if block
        .transactions
        .iter()
        .skip(1)
        .any(|tx| tx.contains_coinbase_input())
    {
        return Err(BlockError::ExtraCoinbase);
    }
    Ok(())
}

/// Validate the transaction batch: the coinbase's own rules, every other
/// transaction against a view that accumulates the block's earlier spends
/// and outputs, and the subsidy cap on what the coinbase claims.
pub fn check_transactions(
    block: &Block,
    utxos: &UtxoSet,
    height: Height,
    median_time_past: DateTime<Utc>,
) -> Result<(), BlockError> {
    coinbase_is_first(block)?;

    let coinbase = &block.transactions[0];
    let wrap = |txid, source| BlockError::Transaction { txid, source };

    tx_check::validate(coinbase, utxos, height, median_time_past)
        .map_err(|source| wrap(coinbase.hash(), source))?;
    let claimed = match coinbase.outputs.first() {
        Some(output) if output.value > Amount::ZERO => {
            Amount::checked_sum(coinbase.outputs.iter().map(|output| output.value))
                .ok_or(BlockError::BadCoinbaseOutput)?
        }
        _ => return Err(BlockError::BadCoinbaseOutput),
    };

    let mut overlay = BlockOverlay::new(utxos);
    overlay.add_outputs(coinbase, height);
    let mut fees = Amount::ZERO;
    for tx in block.transactions.iter().skip(1) {
        let fee = tx_check::validate(&**tx, &overlay, height, median_time_past)
            .map_err(|source| wrap(tx.hash(), source))?;
        // Apply this transaction's effects so later ones in the block see
        // them; a spend of an already-spent outpoint cannot get this far
        // because validate() saw it as missing.
        for input in tx.inputs.iter() {
            if let Some(outpoint) = input.outpoint() {
                overlay.spend(outpoint);
            }
        }
        overlay.add_outputs(tx, height);
        fees = fees
            .checked_add(fee)
            .ok_or(BlockError::OversizeCoinbaseValue)?;
    }

    let budget = BLOCK_SUBSIDY
        .checked_add(fees)
        .ok_or(BlockError::OversizeCoinbaseValue)?;
    if claimed > budget {
        return Err(BlockError::OversizeCoinbaseValue);
    }

    Ok(())
}
