use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use crate::amount::Amount;
use crate::block;
use crate::script::Script;
use crate::serialization::{
    wire_deserialize_exact, SerializationError, WireDeserialize, WireDeserializeInto,
    WireSerialize,
};

use super::*;

/// Builds the reference coinbase transaction: one empty-script input
/// spending the null outpoint, one empty-script output worth 50 coins.
fn reference_coinbase() -> Transaction {
    Transaction::new(
        1,
        vec![Input::Coinbase {
            data: CoinbaseData(Vec::new()),
            sequence: Input::FINAL_SEQUENCE,
        }],
        vec![Output {
            value: Amount::from_sats(5_000_000_000),
            lock_script: Script::empty(),
        }],
        LockTime::unlocked(),
    )
}

#[test]
fn coinbase_ground_truth_serialization() {
    let transaction = reference_coinbase();
    let data = transaction
        .wire_serialize_to_vec()
        .expect("tx should serialize");

    assert_eq!(
        hex::encode(&data),
        "01000000\
         01\
         0000000000000000000000000000000000000000000000000000000000000000ffffffff\
         00\
         ffffffff\
         01\
         00f2052a01000000\
         00\
         00000000"
            .replace(char::is_whitespace, ""),
    );
    assert_eq!(data.len(), transaction.serialized_size());
}

#[test]
fn coinbase_ground_truth_txid() {
    let transaction = reference_coinbase();
    // SHA256d of the serialization above, in display (big-endian) order.
    assert_eq!(
        transaction.hash().to_string(),
        "12d9670a57d494ef1c68731357868862b4ed5871b71942e5b607d8e62e2412eb",
    );
}

#[test]
fn hash_identity_matches_serialization() {
    let transaction = reference_coinbase();
    let data = transaction.wire_serialize_to_vec().unwrap();
    assert_eq!(
        transaction.hash().0,
        crate::serialization::sha256d::hash(&data)
    );
}

#[test]
fn deserialized_txid_is_cached_and_correct() {
    let data = reference_coinbase().wire_serialize_to_vec().unwrap();
    let transaction: Transaction = data.as_slice().wire_deserialize_into().unwrap();
    assert_eq!(transaction.hash(), reference_coinbase().hash());
    assert!(transaction.is_coinbase());
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut data = reference_coinbase().wire_serialize_to_vec().unwrap();
    data.push(0x00);
    match wire_deserialize_exact::<Transaction>(&data) {
        Err(SerializationError::TrailingBytes) => {}
        other => panic!("expected TrailingBytes, got {:?}", other.err()),
    }
}

fn arb_script() -> impl Strategy<Value = Script> {
    proptest::collection::vec(any::<u8>(), 0..80).prop_map(Script::new)
}

fn arb_outpoint() -> impl Strategy<Value = OutPoint> {
    // The index stays below u32::MAX so a random outpoint can never collide
    // with the null sentinel.
    (any::<[u8; 32]>(), 0u32..1_000_000).prop_map(|(bytes, index)| OutPoint {
        hash: Hash(bytes),
        index,
    })
}

fn arb_input() -> impl Strategy<Value = Input> {
    prop_oneof![
        (arb_outpoint(), arb_script(), any::<u32>()).prop_map(
            |(outpoint, unlock_script, sequence)| Input::PrevOut {
                outpoint,
                unlock_script,
                sequence,
            }
        ),
        (proptest::collection::vec(any::<u8>(), 2..100), any::<u32>()).prop_map(
            |(data, sequence)| Input::Coinbase {
                data: CoinbaseData(data),
                sequence,
            }
        ),
    ]
}

fn arb_output() -> impl Strategy<Value = Output> {
    (0i64..=crate::amount::MAX_MONEY, arb_script()).prop_map(|(sats, lock_script)| Output {
        value: Amount::from_sats(sats),
        lock_script,
    })
}

fn arb_lock_time() -> impl Strategy<Value = LockTime> {
    any::<u32>().prop_map(|raw| {
        if raw < LockTime::MIN_TIMESTAMP {
            LockTime::Height(block::Height(raw))
        } else {
            LockTime::Time(Utc.timestamp_opt(i64::from(raw), 0).unwrap())
        }
    })
}

prop_compose! {
    fn arb_transaction()(
        version in any::<i32>(),
        inputs in proptest::collection::vec(arb_input(), 1..8),
        outputs in proptest::collection::vec(arb_output(), 1..8),
        lock_time in arb_lock_time(),
    ) -> Transaction {
        Transaction::new(version, inputs, outputs, lock_time)
    }
}

proptest! {
    #[test]
    fn transaction_roundtrip(transaction in arb_transaction()) {
        let data = transaction.wire_serialize_to_vec().expect("tx should serialize");
        let other: Transaction = data.as_slice().wire_deserialize_into()
            .expect("randomized tx should deserialize");

        prop_assert_eq![&transaction, &other];

        let reserialized = other.wire_serialize_to_vec().expect("tx should reserialize");
        prop_assert_eq![data, reserialized];
    }

    #[test]
    fn transaction_hash_display_fromstr_roundtrip(bytes in any::<[u8; 32]>()) {
        let hash = Hash(bytes);
        let display = format!("{}", hash);
        let parsed = display.parse::<Hash>().expect("hash should parse");
        prop_assert_eq!(hash, parsed);
    }

    #[test]
    fn locktime_roundtrip(lock_time in arb_lock_time()) {
        let data = lock_time.wire_serialize_to_vec()?;
        let other = LockTime::wire_deserialize(data.as_slice())?;
        prop_assert_eq![lock_time, other];
    }
}
