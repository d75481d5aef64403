//! Block subsidy and fee accounting.

use ferrite_chain::{amount::Amount, parameters::BLOCK_SUBSIDY, transaction::Transaction};

use crate::view::UtxoView;

/// The subsidy a block mints. Fixed at 50 coins; this chain has no halving
/// schedule, so the interface takes no height.
pub fn block_subsidy() -> Amount {
    BLOCK_SUBSIDY
}

/// The fee `tx` offers against `view`: inputs minus outputs.
///
/// `None` when an input cannot be resolved or the arithmetic leaves the
/// valid range — callers assembling blocks should skip such transactions.
pub fn transaction_fee<V: UtxoView>(tx: &Transaction, view: &V) -> Option<Amount> {
    if tx.is_coinbase() {
        return Some(Amount::ZERO);
    }
    let mut input_total = Amount::ZERO;
    for input in tx.inputs.iter() {
        let utxo = view.utxo(&input.outpoint()?)?;
        input_total = input_total.checked_add(utxo.output.value)?;
    }
    let output_total = Amount::checked_sum(tx.outputs.iter().map(|output| output.value))?;
    input_total.checked_sub(output_total).filter(|fee| *fee >= Amount::ZERO)
}
