//! The opcode alphabet.

/// Raw opcode byte values, as they appear in serialized scripts.
pub mod consts {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1: u8 = 0x51;
    pub const OP_16: u8 = 0x60;
    pub const OP_VERIFY: u8 = 0x69;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUAL: u8 = 0x87;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_CHECKMULTISIG: u8 = 0xae;
}

use consts::*;

/// An executable opcode in the supported alphabet.
///
/// Push operations (including OP_0 and the PUSHDATA family) are not opcodes
/// at this level; the parser turns them into data tokens directly. Every
/// byte outside this set fails parsing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Opcode {
    /// OP_1 through OP_16: push the small constant `1..=16`.
    Num(u8),
    /// Duplicate the top stack item.
    Dup,
    /// Fail unless the top stack item is truthy.
    Verify,
    /// Marks an output as an unspendable data carrier; never valid in an
    /// executed script.
    Return,
    /// Pop two items, push their equality.
    Equal,
    /// OP_EQUAL followed by OP_VERIFY.
    EqualVerify,
    /// Pop an item, push its HASH160.
    Hash160,
    /// Pop a key and signature, push the ECDSA verification result.
    CheckSig,
    /// Pop key and signature sets, push the threshold verification result.
    CheckMultiSig,
}

impl Opcode {
    /// Decode a raw script byte; `None` for bytes outside the alphabet.
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        match byte {
            OP_1..=OP_16 => Some(Opcode::Num(byte - OP_1 + 1)),
            OP_DUP => Some(Opcode::Dup),
            OP_VERIFY => Some(Opcode::Verify),
            OP_RETURN => Some(Opcode::Return),
            OP_EQUAL => Some(Opcode::Equal),
            OP_EQUALVERIFY => Some(Opcode::EqualVerify),
            OP_HASH160 => Some(Opcode::Hash160),
            OP_CHECKSIG => Some(Opcode::CheckSig),
            OP_CHECKMULTISIG => Some(Opcode::CheckMultiSig),
            _ => None,
        }
    }

    /// The raw script byte for this opcode.
    pub fn to_u8(self) -> u8 {
        match self {
            Opcode::Num(n) => OP_1 + n - 1,
            Opcode::Dup => OP_DUP,
            Opcode::Verify => OP_VERIFY,
            Opcode::Return => OP_RETURN,
            Opcode::Equal => OP_EQUAL,
            Opcode::EqualVerify => OP_EQUALVERIFY,
            Opcode::Hash160 => OP_HASH160,
            Opcode::CheckSig => OP_CHECKSIG,
            Opcode::CheckMultiSig => OP_CHECKMULTISIG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_over_the_alphabet() {
        for byte in 0x51..=0xff_u8 {
            if let Some(opcode) = Opcode::from_u8(byte) {
                assert_eq!(opcode.to_u8(), byte);
            }
        }
    }

    #[test]
    fn num_opcodes_decode_to_their_value() {
        assert_eq!(Opcode::from_u8(consts::OP_1), Some(Opcode::Num(1)));
        assert_eq!(Opcode::from_u8(consts::OP_16), Some(Opcode::Num(16)));
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        // OP_ADD and friends are outside this chain's alphabet.
        assert_eq!(Opcode::from_u8(0x93), None);
        assert_eq!(Opcode::from_u8(0x61), None);
    }
}
