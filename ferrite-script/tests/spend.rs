//! End-to-end spend scenarios: sign with real secp256k1 keys, then verify
//! through the script machine.

use ferrite_chain::{
    amount::Amount,
    script::Script,
    transaction::{Hash, Input, LockTime, OutPoint, Output, Transaction},
};
use ferrite_script::{
    builder, push_data,
    sighash::{signature_hash, SigHashType},
    verify_script,
};
use secp256k1::{rand, All, Message, PublicKey, Secp256k1, SecretKey};

struct Keypair {
    secret: SecretKey,
    public: Vec<u8>,
}

fn keypair(secp: &Secp256k1<All>) -> Keypair {
    let secret = SecretKey::new(&mut rand::thread_rng());
    let public = PublicKey::from_secret_key(secp, &secret)
        .serialize()
        .to_vec();
    Keypair { secret, public }
}

/// A one-input, one-output transaction spending `funding_outpoint`.
fn spending_tx(funding_outpoint: OutPoint) -> Transaction {
    Transaction::new(
        1,
        vec![Input::PrevOut {
            outpoint: funding_outpoint,
            unlock_script: Script::empty(),
            sequence: Input::FINAL_SEQUENCE,
        }],
        vec![Output {
            value: Amount::from_sats(4_999_000_000),
            lock_script: Script::empty(),
        }],
        LockTime::unlocked(),
    )
}

fn funding_outpoint() -> OutPoint {
    OutPoint {
        hash: Hash([0x11; 32]),
        index: 0,
    }
}

/// DER signature over the input's sighash, with the hash-type byte
/// appended, ready to push.
fn sign_input(
    secp: &Secp256k1<All>,
    secret: &SecretKey,
    tx: &Transaction,
    script_code: &Script,
) -> Vec<u8> {
    let digest = signature_hash(tx, 0, script_code, SigHashType::all())
        .expect("input index 0 exists");
    let message = Message::from_slice(&digest).expect("digest is 32 bytes");
    let mut signature = secp.sign_ecdsa(&message, secret).serialize_der().to_vec();
    signature.push(SigHashType::all().raw());
    signature
}

#[test]
fn p2pkh_spend_verifies() {
    let secp = Secp256k1::new();
    let key = keypair(&secp);

    let lock_script = builder::p2pkh(&key.public);
    let mut tx = spending_tx(funding_outpoint());

    let signature = sign_input(&secp, &key.secret, &tx, &lock_script);
    let mut unlock = push_data(&signature);
    unlock.extend_from_slice(&push_data(&key.public));
    let unlock_script = Script::new(unlock);

    if let Input::PrevOut { unlock_script: s, .. } = &mut tx.inputs[0] {
        *s = unlock_script.clone();
    }

    assert!(verify_script(&unlock_script, &lock_script, &tx, 0));
}

#[test]
fn p2pkh_spend_with_wrong_key_fails() {
    let secp = Secp256k1::new();
    let owner = keypair(&secp);
    let thief = keypair(&secp);

    let lock_script = builder::p2pkh(&owner.public);
    let tx = spending_tx(funding_outpoint());

    // Sign with the thief's key, present the thief's pubkey: hash mismatch.
    let signature = sign_input(&secp, &thief.secret, &tx, &lock_script);
    let mut unlock = push_data(&signature);
    unlock.extend_from_slice(&push_data(&thief.public));
    assert!(!verify_script(&Script::new(unlock), &lock_script, &tx, 0));

    // Sign with the thief's key but present the owner's pubkey: bad sig.
    let signature = sign_input(&secp, &thief.secret, &tx, &lock_script);
    let mut unlock = push_data(&signature);
    unlock.extend_from_slice(&push_data(&owner.public));
    assert!(!verify_script(&Script::new(unlock), &lock_script, &tx, 0));
}

#[test]
fn p2pk_spend_verifies() {
    let secp = Secp256k1::new();
    let key = keypair(&secp);

    let lock_script = builder::p2pk(&key.public);
    let tx = spending_tx(funding_outpoint());

    let signature = sign_input(&secp, &key.secret, &tx, &lock_script);
    let unlock_script = Script::new(push_data(&signature));
    assert!(verify_script(&unlock_script, &lock_script, &tx, 0));
}

#[test]
fn two_of_three_multisig() {
    let secp = Secp256k1::new();
    let keys: Vec<Keypair> = (0..3).map(|_| keypair(&secp)).collect();
    let pubkeys: Vec<&[u8]> = keys.iter().map(|key| key.public.as_slice()).collect();

    let lock_script = builder::p2ms(2, &pubkeys);
    let tx = spending_tx(funding_outpoint());

    // Any two distinct keys, in key order, satisfy the script.
    for (first, second) in [(0usize, 1usize), (0, 2), (1, 2)] {
        let sig_a = sign_input(&secp, &keys[first].secret, &tx, &lock_script);
        let sig_b = sign_input(&secp, &keys[second].secret, &tx, &lock_script);
        let mut unlock = vec![0x00]; // the consumed dummy element
        unlock.extend_from_slice(&push_data(&sig_a));
        unlock.extend_from_slice(&push_data(&sig_b));
        assert!(
            verify_script(&Script::new(unlock), &lock_script, &tx, 0),
            "keys {first} and {second} should satisfy 2-of-3",
        );
    }
}

#[test]
fn multisig_rejects_the_same_key_twice() {
    let secp = Secp256k1::new();
    let keys: Vec<Keypair> = (0..3).map(|_| keypair(&secp)).collect();
    let pubkeys: Vec<&[u8]> = keys.iter().map(|key| key.public.as_slice()).collect();

    let lock_script = builder::p2ms(2, &pubkeys);
    let tx = spending_tx(funding_outpoint());

    // Two (distinct) signatures by the same key must not count twice.
    let sig_a = sign_input(&secp, &keys[0].secret, &tx, &lock_script);
    let sig_b = sign_input(&secp, &keys[0].secret, &tx, &lock_script);
    let mut unlock = vec![0x00];
    unlock.extend_from_slice(&push_data(&sig_a));
    unlock.extend_from_slice(&push_data(&sig_b));
    assert!(!verify_script(&Script::new(unlock), &lock_script, &tx, 0));
}

#[test]
fn multisig_rejects_out_of_order_signatures() {
    let secp = Secp256k1::new();
    let keys: Vec<Keypair> = (0..3).map(|_| keypair(&secp)).collect();
    let pubkeys: Vec<&[u8]> = keys.iter().map(|key| key.public.as_slice()).collect();

    let lock_script = builder::p2ms(2, &pubkeys);
    let tx = spending_tx(funding_outpoint());

    // key 2 before key 0 violates the in-order matching rule.
    let sig_late = sign_input(&secp, &keys[2].secret, &tx, &lock_script);
    let sig_early = sign_input(&secp, &keys[0].secret, &tx, &lock_script);
    let mut unlock = vec![0x00];
    unlock.extend_from_slice(&push_data(&sig_late));
    unlock.extend_from_slice(&push_data(&sig_early));
    assert!(!verify_script(&Script::new(unlock), &lock_script, &tx, 0));
}

#[test]
fn p2sh_wrapped_multisig_spend() {
    let secp = Secp256k1::new();
    let keys: Vec<Keypair> = (0..2).map(|_| keypair(&secp)).collect();
    let pubkeys: Vec<&[u8]> = keys.iter().map(|key| key.public.as_slice()).collect();

    let redeem_script = builder::p2ms(2, &pubkeys);
    let lock_script = builder::p2sh(&redeem_script);
    let tx = spending_tx(funding_outpoint());

    // Inside P2SH, signatures commit to the redeem script.
    let sig_a = sign_input(&secp, &keys[0].secret, &tx, &redeem_script);
    let sig_b = sign_input(&secp, &keys[1].secret, &tx, &redeem_script);
    let mut unlock = vec![0x00];
    unlock.extend_from_slice(&push_data(&sig_a));
    unlock.extend_from_slice(&push_data(&sig_b));
    unlock.extend_from_slice(&push_data(redeem_script.as_bytes()));
    assert!(verify_script(&Script::new(unlock), &lock_script, &tx, 0));

    // A different redeem script hashes to a different value and fails the
    // outer equality check.
    let other_redeem = builder::p2ms(1, &pubkeys[..1]);
    let mut unlock = vec![0x00];
    unlock.extend_from_slice(&push_data(&sig_a));
    unlock.extend_from_slice(&push_data(&sig_b));
    unlock.extend_from_slice(&push_data(other_redeem.as_bytes()));
    assert!(!verify_script(&Script::new(unlock), &lock_script, &tx, 0));
}

#[test]
fn signature_is_bound_to_the_transaction() {
    let secp = Secp256k1::new();
    let key = keypair(&secp);

    let lock_script = builder::p2pk(&key.public);
    let tx = spending_tx(funding_outpoint());
    let signature = sign_input(&secp, &key.secret, &tx, &lock_script);
    let unlock_script = Script::new(push_data(&signature));
    assert!(verify_script(&unlock_script, &lock_script, &tx, 0));

    // Mutating the output value invalidates the signature.
    let mut altered = tx.clone();
    altered.outputs[0].value = Amount::from_sats(1);
    assert!(!verify_script(&unlock_script, &lock_script, &altered, 0));
}
