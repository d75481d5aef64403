//! The script tokenizer and push-data encoder.

use ferrite_chain::script::Script;

use crate::{
    error::ScriptError,
    opcode::{consts, Opcode},
    MAX_SCRIPT_SIZE,
};

/// A parsed script token: data to push, or an opcode to execute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    /// Push these bytes onto the stack.
    Push(Vec<u8>),
    /// Execute this opcode.
    Code(Opcode),
}

/// Parse a script into tokens, walking left to right.
///
/// Each byte is either a direct push (0x01–0x4B), a PUSHDATA length prefix,
/// OP_0 (an empty push), or an opcode from the closed alphabet. Anything
/// else fails the whole script.
pub fn parse(script: &Script) -> Result<Vec<Op>, ScriptError> {
    let bytes = script.as_bytes();
    if bytes.len() > MAX_SCRIPT_SIZE {
        return Err(ScriptError::OversizeScript);
    }

    let mut ops = Vec::new();
    let mut pc = 0usize;
    while pc < bytes.len() {
        let byte = bytes[pc];
        pc += 1;
        match byte {
            consts::OP_0 => ops.push(Op::Push(Vec::new())),
            1..=0x4b => {
                let data = take(bytes, &mut pc, byte as usize)?;
                ops.push(Op::Push(data));
            }
            consts::OP_PUSHDATA1 => {
                let len = take(bytes, &mut pc, 1)?[0] as usize;
                let data = take(bytes, &mut pc, len)?;
                ops.push(Op::Push(data));
            }
            consts::OP_PUSHDATA2 => {
                let prefix = take(bytes, &mut pc, 2)?;
                let len = u16::from_le_bytes([prefix[0], prefix[1]]) as usize;
                let data = take(bytes, &mut pc, len)?;
                ops.push(Op::Push(data));
            }
            consts::OP_PUSHDATA4 => {
                let prefix = take(bytes, &mut pc, 4)?;
                let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
                let data = take(bytes, &mut pc, len)?;
                ops.push(Op::Push(data));
            }
            other => match Opcode::from_u8(other) {
                Some(opcode) => ops.push(Op::Code(opcode)),
                None => return Err(ScriptError::BadOpcode(other)),
            },
        }
    }
    Ok(ops)
}

fn take(bytes: &[u8], pc: &mut usize, len: usize) -> Result<Vec<u8>, ScriptError> {
    let end = pc.checked_add(len).ok_or(ScriptError::TruncatedPush)?;
    if end > bytes.len() {
        return Err(ScriptError::TruncatedPush);
    }
    let data = bytes[*pc..end].to_vec();
    *pc = end;
    Ok(data)
}

/// Encode a data push in its shortest form: OP_0 for empty data, a direct
/// push up to 75 bytes, then the PUSHDATA1/2/4 prefixes.
pub fn push_data(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 5);
    match data.len() {
        0 => {
            out.push(consts::OP_0);
            return out;
        }
        len @ 1..=75 => out.push(len as u8),
        len @ 76..=0xff => {
            out.push(consts::OP_PUSHDATA1);
            out.push(len as u8);
        }
        len @ 0x100..=0xffff => {
            out.push(consts::OP_PUSHDATA2);
            out.extend_from_slice(&(len as u16).to_le_bytes());
        }
        len => {
            out.push(consts::OP_PUSHDATA4);
            out.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    out.extend_from_slice(data);
    out
}
