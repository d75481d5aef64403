//! The script virtual machine.
//!
//! Verification runs the unlocking script, then the locking script, against
//! one shared stack of byte vectors. Spending succeeds when the final stack
//! is non-empty with a truthy top item. Pay-to-script-hash outputs add one
//! level of recursion: the top unlocking push is re-parsed as a script and
//! executed against the rest of the unlocking stack.

use ferrite_chain::{script::Script, transaction::Transaction};

use crate::{
    builder,
    error::ScriptError,
    opcode::{consts, Opcode},
    parser::{self, Op},
    sighash::{self, SigHashType},
    signature, MAX_MULTISIG_KEYS, MAX_OPS_PER_SCRIPT, MAX_STACK_SIZE,
};

type Stack = Vec<Vec<u8>>;

/// Whether `script` matches the pay-to-script-hash pattern exactly:
/// `OP_HASH160 <20-byte push> OP_EQUAL`.
pub fn is_pay_to_script_hash(script: &Script) -> bool {
    let bytes = script.as_bytes();
    bytes.len() == 23
        && bytes[0] == consts::OP_HASH160
        && bytes[1] == 20
        && bytes[22] == consts::OP_EQUAL
}

/// Decode a stack item as a little-endian signed number; empty is zero.
fn decode_num(data: &[u8]) -> i64 {
    if data.is_empty() {
        return 0;
    }
    let mut result: i64 = 0;
    for (i, &byte) in data.iter().enumerate().take(8) {
        let byte = if i == data.len() - 1 { byte & 0x7f } else { byte };
        result |= i64::from(byte) << (8 * i);
    }
    if data[data.len() - 1] & 0x80 != 0 {
        -result
    } else {
        result
    }
}

/// Script truthiness: false is empty, all zeros, or negative zero.
fn cast_to_bool(data: &[u8]) -> bool {
    for (i, &byte) in data.iter().enumerate() {
        if byte != 0 {
            if i == data.len() - 1 && byte == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}

fn bool_item(value: bool) -> Vec<u8> {
    if value {
        vec![1]
    } else {
        Vec::new()
    }
}

/// Execute a token stream against `stack`.
///
/// `script_code` is the script the input's signatures commit to: the
/// locking script for ordinary spends, the redeem script inside a P2SH
/// spend.
pub fn eval_script(
    ops: &[Op],
    stack: &mut Stack,
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
) -> Result<(), ScriptError> {
    let mut op_count = 0usize;
    for op in ops {
        match op {
            Op::Push(data) => stack.push(data.clone()),
            Op::Code(code) => {
                op_count += 1;
                if op_count > MAX_OPS_PER_SCRIPT {
                    return Err(ScriptError::OpCountExceeded);
                }
                execute_opcode(*code, stack, tx, input_index, script_code)?;
            }
        }
        if stack.len() > MAX_STACK_SIZE {
            return Err(ScriptError::StackOverflow);
        }
    }
    Ok(())
}

fn execute_opcode(
    code: Opcode,
    stack: &mut Stack,
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
) -> Result<(), ScriptError> {
    match code {
        Opcode::Num(n) => stack.push(vec![n]),
        Opcode::Dup => {
            let top = stack.last().ok_or(ScriptError::StackUnderflow)?.clone();
            stack.push(top);
        }
        Opcode::Hash160 => {
            let data = stack.pop().ok_or(ScriptError::StackUnderflow)?;
            stack.push(builder::hash160(&data).to_vec());
        }
        Opcode::Equal => {
            let a = stack.pop().ok_or(ScriptError::StackUnderflow)?;
            let b = stack.pop().ok_or(ScriptError::StackUnderflow)?;
            stack.push(bool_item(a == b));
        }
        Opcode::EqualVerify => {
            let a = stack.pop().ok_or(ScriptError::StackUnderflow)?;
            let b = stack.pop().ok_or(ScriptError::StackUnderflow)?;
            if a != b {
                return Err(ScriptError::VerifyFailed);
            }
        }
        Opcode::Verify => {
            let top = stack.pop().ok_or(ScriptError::StackUnderflow)?;
            if !cast_to_bool(&top) {
                return Err(ScriptError::VerifyFailed);
            }
        }
        Opcode::Return => return Err(ScriptError::ExecutedReturn),
        Opcode::CheckSig => {
            let pubkey = stack.pop().ok_or(ScriptError::StackUnderflow)?;
            let sig = stack.pop().ok_or(ScriptError::StackUnderflow)?;
            let valid = check_signature(&sig, &pubkey, tx, input_index, script_code);
            stack.push(bool_item(valid));
        }
        Opcode::CheckMultiSig => {
            op_checkmultisig(stack, tx, input_index, script_code)?;
        }
    }
    Ok(())
}

/// Split a stack signature into DER bytes and hash type, compute the
/// sighash, and verify. Every malformation is simply an invalid signature.
fn check_signature(
    sig: &[u8],
    pubkey: &[u8],
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
) -> bool {
    let (hashtype_byte, der) = match sig.split_last() {
        Some((last, rest)) => (*last, rest),
        None => return false,
    };
    let hashtype = match SigHashType::from_byte(hashtype_byte) {
        Ok(hashtype) => hashtype,
        Err(_) => return false,
    };
    let digest = match sighash::signature_hash(tx, input_index, script_code, hashtype) {
        Ok(digest) => digest,
        Err(_) => return false,
    };
    signature::verify_ecdsa(pubkey, der, &digest)
}

fn op_checkmultisig(
    stack: &mut Stack,
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
) -> Result<(), ScriptError> {
    let n = decode_num(&stack.pop().ok_or(ScriptError::StackUnderflow)?);
    if n < 0 || n > MAX_MULTISIG_KEYS as i64 {
        return Err(ScriptError::MultisigCountInvalid);
    }
    let n = n as usize;
    if stack.len() < n {
        return Err(ScriptError::StackUnderflow);
    }
    // split_off leaves the keys in script (push) order.
    let pubkeys = stack.split_off(stack.len() - n);

    let m = decode_num(&stack.pop().ok_or(ScriptError::StackUnderflow)?);
    if m < 0 || m as usize > n {
        return Err(ScriptError::MultisigCountInvalid);
    }
    let m = m as usize;
    if stack.len() < m {
        return Err(ScriptError::StackUnderflow);
    }
    let sigs = stack.split_off(stack.len() - m);

    // The historical off-by-one: one extra stack item is consumed and
    // ignored.
    stack.pop().ok_or(ScriptError::StackUnderflow)?;

    // Signatures must match keys in order; a key, once passed, is never
    // revisited.
    let mut valid = 0usize;
    let mut key_cursor = 0usize;
    for sig in &sigs {
        while key_cursor < pubkeys.len() {
            let key = &pubkeys[key_cursor];
            key_cursor += 1;
            if check_signature(sig, key, tx, input_index, script_code) {
                valid += 1;
                break;
            }
        }
    }

    stack.push(bool_item(valid >= m));
    Ok(())
}

/// Verify that `script_sig` satisfies `script_pubkey` for the given input.
///
/// Every internal failure — parse errors, stack faults, limit violations —
/// collapses into `false`; callers see a boolean.
pub fn verify_script(
    script_sig: &Script,
    script_pubkey: &Script,
    tx: &Transaction,
    input_index: usize,
) -> bool {
    matches!(
        verify_script_inner(script_sig, script_pubkey, tx, input_index),
        Ok(true)
    )
}

fn verify_script_inner(
    script_sig: &Script,
    script_pubkey: &Script,
    tx: &Transaction,
    input_index: usize,
) -> Result<bool, ScriptError> {
    let sig_ops = parser::parse(script_sig)?;
    let pubkey_ops = parser::parse(script_pubkey)?;

    let mut stack: Stack = Vec::new();
    eval_script(&sig_ops, &mut stack, tx, input_index, script_pubkey)?;

    if is_pay_to_script_hash(script_pubkey) {
        // The top unlocking push doubles as the redeem script.
        let redeem_bytes = match stack.last() {
            Some(bytes) => bytes.clone(),
            None => return Ok(false),
        };
        let snapshot = stack.clone();

        eval_script(&pubkey_ops, &mut stack, tx, input_index, script_pubkey)?;
        match stack.pop() {
            Some(top) if cast_to_bool(&top) => {}
            _ => return Ok(false),
        }

        let redeem_script = Script::new(redeem_bytes);
        let redeem_ops = parser::parse(&redeem_script)?;
        let mut redeem_stack = snapshot;
        redeem_stack.pop();
        eval_script(
            &redeem_ops,
            &mut redeem_stack,
            tx,
            input_index,
            &redeem_script,
        )?;
        Ok(matches!(redeem_stack.last(), Some(top) if cast_to_bool(top)))
    } else {
        eval_script(&pubkey_ops, &mut stack, tx, input_index, script_pubkey)?;
        Ok(matches!(stack.last(), Some(top) if cast_to_bool(top)))
    }
}
