//! Transaction checks.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use ferrite_chain::{
    amount::Amount,
    block::Height,
    parameters::{COINBASE_DATA_RANGE, COINBASE_MATURITY},
    transaction::{Input, LockTime, Transaction, MAX_TX_SIZE},
};
use ferrite_script::verify_script;

use crate::{error::TransactionError, view::UtxoView};

/// Validate `tx` against `view`, as if it were being committed at
/// `spending_height`.
///
/// `lock_time_bound` is the time a time-locktime is compared against: the
/// parent's median time past in block context, the wall clock on first
/// mempool insertion.
///
/// Returns the fee the transaction offers (zero for a coinbase).
pub fn validate<V: UtxoView>(
    tx: &Transaction,
    view: &V,
    spending_height: Height,
    lock_time_bound: DateTime<Utc>,
) -> Result<Amount, TransactionError> {
    if tx.serialized_size() as u64 > MAX_TX_SIZE {
        return Err(TransactionError::OversizeTx);
    }
    if tx.inputs.is_empty() {
        return Err(TransactionError::NoInputs);
    }
    if tx.outputs.is_empty() {
        return Err(TransactionError::NoOutputs);
    }

    // A coinbase gets only the data-size check; everything else about it
    // is the block validator's business.
    if tx.is_coinbase() {
        if let Some(Input::Coinbase { data, .. }) = tx.inputs.first() {
            if !COINBASE_DATA_RANGE.contains(&data.as_ref().len()) {
                return Err(TransactionError::BadCoinbaseScriptSig);
            }
        }
        return Ok(Amount::ZERO);
    }
    if tx.contains_coinbase_input() {
        return Err(TransactionError::UnexpectedCoinbaseInput);
    }

    // Resolve every input and apply the coinbase maturity rule.
    let mut seen_outpoints = HashSet::new();
    let mut resolved = Vec::with_capacity(tx.inputs.len());
    for (index, input) in tx.inputs.iter().enumerate() {
        let outpoint = input
            .outpoint()
            .expect("coinbase inputs were rejected above");
        if !seen_outpoints.insert(outpoint) {
            return Err(TransactionError::DuplicateSpend);
        }
        let utxo = view
            .utxo(&outpoint)
            .ok_or(TransactionError::NonExistentUtxo { index })?;
        if utxo.from_coinbase
            && spending_height.0.saturating_sub(utxo.height.0) < COINBASE_MATURITY
        {
            return Err(TransactionError::ImmatureCoinbaseSpend { index });
        }
        resolved.push(utxo);
    }

    for (index, output) in tx.outputs.iter().enumerate() {
        if !output.value.is_valid_money() {
            return Err(TransactionError::BadOutputValue(index));
        }
    }

    let input_total = Amount::checked_sum(resolved.iter().map(|utxo| utxo.output.value))
        .ok_or(TransactionError::NegativeFee)?;
    let output_total = Amount::checked_sum(tx.outputs.iter().map(|output| output.value))
        .ok_or(TransactionError::NegativeFee)?;
    if input_total < output_total {
        return Err(TransactionError::NegativeFee);
    }

    for (index, input) in tx.inputs.iter().enumerate() {
        let unlock_script = match input {
            Input::PrevOut { unlock_script, .. } => unlock_script,
            Input::Coinbase { .. } => unreachable!("coinbase inputs were rejected above"),
        };
        if !verify_script(
            unlock_script,
            &resolved[index].output.lock_script,
            tx,
            index,
        ) {
            return Err(TransactionError::ScriptFail { index });
        }
    }

    if !tx.lock_time.is_unlocked() {
        let satisfied = match tx.lock_time {
            LockTime::Height(height) => height < spending_height,
            LockTime::Time(time) => time < lock_time_bound,
        };
        if !satisfied {
            return Err(TransactionError::LockTimeNotMet);
        }
    }

    input_total
        .checked_sub(output_total)
        .ok_or(TransactionError::NegativeFee)
}
