//! Script parsing, construction and execution.
//!
//! Spending an output means running two programs against a shared stack:
//! the input's unlocking script, then the output's locking script. The
//! result is a single boolean; every failure mode inside the machine
//! collapses to `false` at the [`interpreter::verify_script`] boundary.
//!
//! The opcode alphabet is a closed set. Scripts are parsed into
//! [`parser::Op`] tokens up front, so execution is one exhaustive match and
//! unknown opcodes are impossible to reach.

pub mod builder;
pub mod interpreter;
pub mod opcode;
pub mod parser;
pub mod sighash;
pub mod signature;

mod error;

pub use error::ScriptError;
pub use interpreter::{is_pay_to_script_hash, verify_script};
pub use parser::{parse, push_data, Op};

use ferrite_chain::script::Script;

/// The maximum script size, in bytes.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// The maximum number of items on the evaluation stack.
pub const MAX_STACK_SIZE: usize = 1_000;

/// The maximum number of executed (non-push) opcodes per script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// The maximum number of keys in a checked multisig.
pub const MAX_MULTISIG_KEYS: usize = 20;

/// Whether a locking script is provably unspendable (an OP_RETURN data
/// carrier). Such outputs are never entered into the UTXO set.
pub fn is_unspendable(script: &Script) -> bool {
    script.as_bytes().first() == Some(&opcode::consts::OP_RETURN)
}
