use thiserror::Error;

/// Reasons script parsing or execution can fail.
///
/// Propagation is local: [`crate::verify_script`] collapses every variant
/// into a `false` result, but the distinct kinds keep unit tests and trace
/// output discriminable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptError {
    /// An operation needed more stack items than were present.
    #[error("stack underflow")]
    StackUnderflow,

    /// The stack grew past the size limit.
    #[error("stack overflow")]
    StackOverflow,

    /// A byte outside the supported opcode alphabet.
    #[error("unknown or forbidden opcode {0:#04x}")]
    BadOpcode(u8),

    /// Too many executed opcodes in one script.
    #[error("opcode budget exceeded")]
    OpCountExceeded,

    /// The script is larger than the script size limit.
    #[error("oversize script")]
    OversizeScript,

    /// A push operation ran past the end of the script.
    #[error("push runs past the end of the script")]
    TruncatedPush,

    /// The signature's trailing hash-type byte is not a supported mode.
    #[error("invalid signature hash type {0:#04x}")]
    SighashBadType(u8),

    /// OP_VERIFY or OP_EQUALVERIFY saw a falsy top item.
    #[error("verify operation failed")]
    VerifyFailed,

    /// OP_RETURN was reached during execution.
    #[error("executed an unspendable output marker")]
    ExecutedReturn,

    /// The input index passed to signature hashing is out of range.
    #[error("input index {0} out of range")]
    InputIndexOutOfRange(usize),

    /// Multisig key or signature counts outside `0 <= m <= n <= 20`.
    #[error("multisig key or signature count out of range")]
    MultisigCountInvalid,
}
