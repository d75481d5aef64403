//! Transaction signature hashes.
//!
//! A signature commits to a *modified* copy of the spending transaction:
//! input scripts are cleared, the signed input carries the script being
//! satisfied, and the hash-type byte selects how much of the rest of the
//! transaction is covered.

use ferrite_chain::{
    script::Script,
    serialization::{sha256d, WireSerialize},
    transaction::{Input, Output, Transaction},
};

use crate::error::ScriptError;

/// Sign all outputs.
pub const SIGHASH_ALL: u8 = 0x01;
/// Sign no outputs.
pub const SIGHASH_NONE: u8 = 0x02;
/// Sign only the output paired with the signed input.
pub const SIGHASH_SINGLE: u8 = 0x03;
/// Commit only to the signed input, letting others be added.
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

/// Which outputs a signature commits to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Base {
    All,
    None,
    Single,
}

/// A validated signature hash-type byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SigHashType {
    base: Base,
    anyone_can_pay: bool,
    raw: u8,
}

impl SigHashType {
    /// Parse a raw hash-type byte. The base mode lives in the low five
    /// bits; bit 0x80 is the ANYONECANPAY flag. Unknown base modes fail.
    pub fn from_byte(byte: u8) -> Result<SigHashType, ScriptError> {
        let anyone_can_pay = byte & SIGHASH_ANYONECANPAY != 0;
        let base = match byte & 0x1f {
            SIGHASH_ALL => Base::All,
            SIGHASH_NONE => Base::None,
            SIGHASH_SINGLE => Base::Single,
            _ => return Err(ScriptError::SighashBadType(byte)),
        };
        Ok(SigHashType {
            base,
            anyone_can_pay,
            raw: byte,
        })
    }

    /// The standard SIGHASH_ALL type.
    pub fn all() -> SigHashType {
        SigHashType {
            base: Base::All,
            anyone_can_pay: false,
            raw: SIGHASH_ALL,
        }
    }

    /// The raw byte, as appended to signatures and the hash preimage.
    pub fn raw(&self) -> u8 {
        self.raw
    }
}

/// The digest signed when SIGHASH_SINGLE points past the last output.
///
/// This mirrors the historical behavior: rather than failing, the hash is
/// the constant `0x00..01`, and the signature over that constant verifies.
/// It is consensus-critical and deliberately preserved.
pub fn single_out_of_range_sentinel() -> [u8; 32] {
    let mut sentinel = [0u8; 32];
    sentinel[31] = 1;
    sentinel
}

/// Compute the digest a signature on `tx.inputs[input_index]` signs, given
/// the script being satisfied and the hash type.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    hashtype: SigHashType,
) -> Result<[u8; 32], ScriptError> {
    if input_index >= tx.inputs.len() {
        return Err(ScriptError::InputIndexOutOfRange(input_index));
    }

    // Copy the inputs with cleared scripts. ANYONECANPAY keeps only the
    // signed input.
    let mut inputs: Vec<Input> = if hashtype.anyone_can_pay {
        vec![cleared(&tx.inputs[input_index])]
    } else {
        tx.inputs.iter().map(cleared).collect()
    };
    let current = if hashtype.anyone_can_pay {
        0
    } else {
        input_index
    };
    if let Input::PrevOut { unlock_script, .. } = &mut inputs[current] {
        *unlock_script = script_code.clone();
    }

    let outputs: Vec<Output> = match hashtype.base {
        Base::All => tx.outputs.clone(),
        Base::None => {
            zero_other_sequences(&mut inputs, current);
            Vec::new()
        }
        Base::Single => {
            if input_index >= tx.outputs.len() {
                return Ok(single_out_of_range_sentinel());
            }
            zero_other_sequences(&mut inputs, current);
            vec![tx.outputs[input_index].clone()]
        }
    };

    let modified = Transaction::new(tx.version, inputs, outputs, tx.lock_time);
    let mut hash_writer = sha256d::Writer::default();
    modified
        .wire_serialize(&mut hash_writer)
        .expect("sha256d::Writer is infallible");
    u32::from(hashtype.raw)
        .wire_serialize(&mut hash_writer)
        .expect("sha256d::Writer is infallible");
    Ok(hash_writer.finish())
}

fn cleared(input: &Input) -> Input {
    match input {
        Input::PrevOut {
            outpoint, sequence, ..
        } => Input::PrevOut {
            outpoint: *outpoint,
            unlock_script: Script::empty(),
            sequence: *sequence,
        },
        Input::Coinbase { data, sequence } => Input::Coinbase {
            data: data.clone(),
            sequence: *sequence,
        },
    }
}

fn zero_other_sequences(inputs: &mut [Input], keep: usize) {
    for (i, input) in inputs.iter_mut().enumerate() {
        if i == keep {
            continue;
        }
        match input {
            Input::PrevOut { sequence, .. } | Input::Coinbase { sequence, .. } => *sequence = 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_chain::amount::Amount;
    use ferrite_chain::transaction::{LockTime, OutPoint};

    fn two_in_two_out() -> Transaction {
        let input = |index| Input::PrevOut {
            outpoint: OutPoint {
                hash: ferrite_chain::transaction::Hash([index; 32]),
                index: u32::from(index),
            },
            unlock_script: Script::new(vec![1, 0xAB]),
            sequence: Input::FINAL_SEQUENCE,
        };
        let output = |sats| Output {
            value: Amount::from_sats(sats),
            lock_script: Script::new(vec![0x51]),
        };
        Transaction::new(
            1,
            vec![input(1), input(2)],
            vec![output(10), output(20)],
            LockTime::unlocked(),
        )
    }

    #[test]
    fn bad_types_are_rejected() {
        assert!(SigHashType::from_byte(0x00).is_err());
        assert!(SigHashType::from_byte(0x04).is_err());
        assert!(SigHashType::from_byte(0x01).is_ok());
        assert!(SigHashType::from_byte(0x81).is_ok());
        assert!(SigHashType::from_byte(0x83).is_ok());
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let tx = two_in_two_out();
        let code = Script::new(vec![0x51]);
        assert_eq!(
            signature_hash(&tx, 9, &code, SigHashType::all()),
            Err(ScriptError::InputIndexOutOfRange(9)),
        );
    }

    #[test]
    fn single_out_of_range_returns_the_sentinel() {
        // Three inputs, two outputs: input 2 has no paired output.
        let mut tx = two_in_two_out();
        tx.inputs.push(Input::PrevOut {
            outpoint: OutPoint {
                hash: ferrite_chain::transaction::Hash([3; 32]),
                index: 3,
            },
            unlock_script: Script::empty(),
            sequence: Input::FINAL_SEQUENCE,
        });
        let code = Script::new(vec![0x51]);
        let hashtype = SigHashType::from_byte(SIGHASH_SINGLE).unwrap();
        assert_eq!(
            signature_hash(&tx, 2, &code, hashtype).unwrap(),
            single_out_of_range_sentinel(),
        );
    }

    #[test]
    fn hash_depends_on_the_type_byte() {
        let tx = two_in_two_out();
        let code = Script::new(vec![0x51]);
        let all = signature_hash(&tx, 0, &code, SigHashType::all()).unwrap();
        let none = signature_hash(
            &tx,
            0,
            &code,
            SigHashType::from_byte(SIGHASH_NONE).unwrap(),
        )
        .unwrap();
        assert_ne!(all, none);
    }

    #[test]
    fn anyone_can_pay_ignores_other_inputs() {
        let tx = two_in_two_out();
        let mut extended = tx.clone();
        extended.inputs.push(Input::PrevOut {
            outpoint: OutPoint {
                hash: ferrite_chain::transaction::Hash([9; 32]),
                index: 9,
            },
            unlock_script: Script::empty(),
            sequence: Input::FINAL_SEQUENCE,
        });

        let code = Script::new(vec![0x51]);
        let hashtype = SigHashType::from_byte(SIGHASH_ALL | SIGHASH_ANYONECANPAY).unwrap();
        assert_eq!(
            signature_hash(&tx, 0, &code, hashtype).unwrap(),
            signature_hash(&extended, 0, &code, hashtype).unwrap(),
        );
    }
}
