//! ECDSA signature verification over secp256k1.

use lazy_static::lazy_static;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};

lazy_static! {
    static ref SECP: Secp256k1<VerifyOnly> = Secp256k1::verification_only();
}

/// Verify a DER-encoded ECDSA signature over a 32-byte digest.
///
/// Malformed keys and signatures verify as `false`; this function never
/// panics on untrusted input.
pub fn verify_ecdsa(pubkey: &[u8], der_sig: &[u8], sighash: &[u8; 32]) -> bool {
    let pubkey = match PublicKey::from_slice(pubkey) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let signature = match Signature::from_der(der_sig) {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    let message = match Message::from_slice(sighash) {
        Ok(message) => message,
        Err(_) => return false,
    };
    SECP.verify_ecdsa(&message, &signature, &pubkey).is_ok()
}
