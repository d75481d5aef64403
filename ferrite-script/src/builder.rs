//! Standard script construction.

use ferrite_chain::script::Script;

use crate::opcode::consts::*;
use crate::parser::push_data;

/// Compute HASH160: RIPEMD-160 of SHA-256. The digest behind pay-to-hash
/// script patterns.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    use ripemd::Ripemd160;
    use sha2::{Digest, Sha256};

    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Build a pay-to-public-key locking script: `<pubkey> OP_CHECKSIG`.
pub fn p2pk(pubkey: &[u8]) -> Script {
    assert!(
        matches!(pubkey.len(), 33 | 65),
        "public keys are 33 or 65 bytes"
    );
    let mut bytes = push_data(pubkey);
    bytes.push(OP_CHECKSIG);
    Script::new(bytes)
}

/// Build a pay-to-public-key-hash locking script from a full public key.
pub fn p2pkh(pubkey: &[u8]) -> Script {
    assert!(
        matches!(pubkey.len(), 33 | 65),
        "public keys are 33 or 65 bytes"
    );
    p2pkh_from_hash(&hash160(pubkey))
}

/// Build a pay-to-public-key-hash locking script from a 20-byte key hash:
/// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`.
pub fn p2pkh_from_hash(pubkey_hash: &[u8; 20]) -> Script {
    let mut bytes = vec![OP_DUP, OP_HASH160];
    bytes.extend_from_slice(&push_data(pubkey_hash));
    bytes.push(OP_EQUALVERIFY);
    bytes.push(OP_CHECKSIG);
    Script::new(bytes)
}

/// Build an m-of-n bare multisig locking script:
/// `OP_m <pk 1> .. <pk n> OP_n OP_CHECKMULTISIG`.
pub fn p2ms(m: usize, pubkeys: &[&[u8]]) -> Script {
    let n = pubkeys.len();
    assert!((1..=16).contains(&m), "m must be between 1 and 16");
    assert!(m <= n && n <= 16, "need m <= n <= 16 public keys");

    let mut bytes = vec![OP_1 + (m as u8) - 1];
    for pubkey in pubkeys {
        bytes.extend_from_slice(&push_data(pubkey));
    }
    bytes.push(OP_1 + (n as u8) - 1);
    bytes.push(OP_CHECKMULTISIG);
    Script::new(bytes)
}

/// Build a pay-to-script-hash locking script:
/// `OP_HASH160 <hash160(redeem)> OP_EQUAL`.
pub fn p2sh(redeem_script: &Script) -> Script {
    let script_hash = hash160(redeem_script.as_bytes());
    let mut bytes = vec![OP_HASH160];
    bytes.extend_from_slice(&push_data(&script_hash));
    bytes.push(OP_EQUAL);
    Script::new(bytes)
}

/// Build an unspendable data-carrier output script: `OP_RETURN <data>`.
pub fn op_return(data: &[u8]) -> Script {
    let mut bytes = vec![OP_RETURN];
    bytes.extend_from_slice(&push_data(data));
    Script::new(bytes)
}

/// Build the coinbase data for a block at `height`: the height script-pushed
/// as a 4-byte little-endian value, followed by free-form miner bytes.
pub fn coinbase_data(height: u32, extra: &[u8]) -> Vec<u8> {
    let mut bytes = push_data(&height.to_le_bytes());
    bytes.extend_from_slice(extra);
    bytes
}
