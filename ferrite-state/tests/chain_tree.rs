//! Block-index tree and UTXO connect/disconnect behavior.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use ferrite_chain::{
    amount::Amount,
    block::{merkle, Block, Header, Height},
    parameters::GENESIS_PREVIOUS_BLOCK_HASH,
    script::Script,
    transaction::{CoinbaseData, Input, LockTime, OutPoint, Output, Transaction},
    work::difficulty::CompactDifficulty,
};
use ferrite_state::{BlockIndex, Insertion, StateError, UtxoSet};

/// A trivially easy difficulty so hand-made blocks have well-defined work.
const EASY_BITS: CompactDifficulty = CompactDifficulty(0x207fffff);
/// A somewhat harder difficulty, for work-versus-length tests.
const HARD_BITS: CompactDifficulty = CompactDifficulty(0x1f7fffff);

fn coinbase(height: u32, tag: u8) -> Arc<Transaction> {
    let mut data = vec![4u8];
    data.extend_from_slice(&height.to_le_bytes());
    data.push(tag);
    Arc::new(Transaction::new(
        1,
        vec![Input::Coinbase {
            data: CoinbaseData(data),
            sequence: Input::FINAL_SEQUENCE,
        }],
        vec![Output {
            value: Amount::from_sats(5_000_000_000),
            lock_script: Script::new(vec![0x51, tag]),
        }],
        LockTime::unlocked(),
    ))
}

fn build_block(
    parent: &ferrite_chain::block::Hash,
    height: u32,
    tag: u8,
    time: u32,
    bits: CompactDifficulty,
    extra_transactions: Vec<Arc<Transaction>>,
) -> Arc<Block> {
    let mut transactions = vec![coinbase(height, tag)];
    transactions.extend(extra_transactions);
    let merkle_root: merkle::Root = transactions.iter().map(|tx| tx.hash()).collect();
    let header = Header::new(
        1,
        *parent,
        merkle_root,
        Utc.timestamp_opt(1_600_000_000 + i64::from(time), 0).unwrap(),
        bits,
        0,
    );
    Arc::new(Block {
        header,
        transactions,
    })
}

fn genesis() -> Arc<Block> {
    build_block(&GENESIS_PREVIOUS_BLOCK_HASH, 0, 0, 0, EASY_BITS, Vec::new())
}

#[test]
fn genesis_rules() {
    let mut index = BlockIndex::new();
    let genesis = genesis();
    assert!(matches!(
        index.insert(genesis.clone()),
        Ok(Insertion::Extended { .. })
    ));
    assert_eq!(index.tip_hash(), Some(genesis.hash()));
    assert_eq!(index.tip_height(), Some(Height(0)));

    // The same genesis again is a duplicate.
    assert!(matches!(
        index.insert(genesis.clone()),
        Err(StateError::Duplicate(_))
    ));

    // A competing genesis has no known parent once a root exists.
    let rival = build_block(&GENESIS_PREVIOUS_BLOCK_HASH, 0, 9, 9, EASY_BITS, Vec::new());
    assert!(matches!(index.insert(rival), Err(StateError::Orphan { .. })));
}

#[test]
fn orphans_are_rejected_at_the_index() {
    let mut index = BlockIndex::new();
    index.insert(genesis()).unwrap();

    let unknown_parent = ferrite_chain::block::Hash([0xAB; 32]);
    let orphan = build_block(&unknown_parent, 2, 1, 1, EASY_BITS, Vec::new());
    match index.insert(orphan) {
        Err(StateError::Orphan { parent, .. }) => assert_eq!(parent, unknown_parent),
        other => panic!("expected Orphan, got {other:?}"),
    }
}

#[test]
fn extension_moves_the_tip() {
    let mut index = BlockIndex::new();
    let g = genesis();
    index.insert(g.clone()).unwrap();

    let a = build_block(&g.hash(), 1, 1, 1, EASY_BITS, Vec::new());
    assert!(matches!(
        index.insert(a.clone()),
        Ok(Insertion::Extended { .. })
    ));
    assert_eq!(index.tip_hash(), Some(a.hash()));
    assert_eq!(index.tip_height(), Some(Height(1)));
}

#[test]
fn first_seen_wins_ties() {
    let mut index = BlockIndex::new();
    let g = genesis();
    index.insert(g.clone()).unwrap();

    let first = build_block(&g.hash(), 1, 1, 1, EASY_BITS, Vec::new());
    let rival = build_block(&g.hash(), 1, 2, 2, EASY_BITS, Vec::new());
    index.insert(first.clone()).unwrap();
    assert!(matches!(
        index.insert(rival.clone()),
        Ok(Insertion::SideChain { .. })
    ));
    assert_eq!(index.tip_hash(), Some(first.hash()));
}

#[test]
fn longer_side_branch_triggers_a_reorg() {
    let mut index = BlockIndex::new();
    let g = genesis();
    index.insert(g.clone()).unwrap();

    // Main chain: G -> A -> B.
    let a = build_block(&g.hash(), 1, 1, 1, EASY_BITS, Vec::new());
    let b = build_block(&a.hash(), 2, 2, 2, EASY_BITS, Vec::new());
    index.insert(a.clone()).unwrap();
    index.insert(b.clone()).unwrap();

    // Side chain: G -> C -> D -> E, inserted in order.
    let c = build_block(&g.hash(), 1, 3, 3, EASY_BITS, Vec::new());
    let d = build_block(&c.hash(), 2, 4, 4, EASY_BITS, Vec::new());
    let e = build_block(&d.hash(), 3, 5, 5, EASY_BITS, Vec::new());
    index.insert(c.clone()).unwrap();
    index.insert(d.clone()).unwrap();

    match index.insert(e.clone()).unwrap() {
        Insertion::Reorganized {
            fork,
            disconnected,
            connected,
            ..
        } => {
            assert_eq!(index.node(fork).hash, g.hash());
            let disconnected: Vec<_> = disconnected.iter().map(|blk| blk.hash()).collect();
            assert_eq!(disconnected, vec![b.hash(), a.hash()]);
            let connected: Vec<_> = connected
                .iter()
                .map(|(blk, height)| (blk.hash(), height.0))
                .collect();
            assert_eq!(
                connected,
                vec![(c.hash(), 1), (d.hash(), 2), (e.hash(), 3)]
            );
        }
        other => panic!("expected Reorganized, got {other:?}"),
    }

    assert_eq!(index.tip_hash(), Some(e.hash()));
    // The main-chain walk now runs through the new branch.
    let main: Vec<_> = index
        .main_chain()
        .into_iter()
        .map(|id| index.node(id).hash)
        .collect();
    assert_eq!(main, vec![g.hash(), c.hash(), d.hash(), e.hash()]);
}

#[test]
fn more_work_beats_more_length() {
    let mut index = BlockIndex::new();
    let g = genesis();
    index.insert(g.clone()).unwrap();

    // Three easy blocks: cumulative work 2 + 2 + 2 + 2 (incl. genesis).
    let a = build_block(&g.hash(), 1, 1, 1, EASY_BITS, Vec::new());
    let b = build_block(&a.hash(), 2, 2, 2, EASY_BITS, Vec::new());
    let c = build_block(&b.hash(), 3, 3, 3, EASY_BITS, Vec::new());
    index.insert(a.clone()).unwrap();
    index.insert(b.clone()).unwrap();
    index.insert(c.clone()).unwrap();

    // One hard block outweighs the three easy ones.
    let heavy = build_block(&g.hash(), 1, 4, 4, HARD_BITS, Vec::new());
    assert!(matches!(
        index.insert(heavy.clone()),
        Ok(Insertion::Reorganized { .. })
    ));
    assert_eq!(index.tip_hash(), Some(heavy.hash()));
    assert_eq!(index.tip_height(), Some(Height(1)));
}

#[test]
fn median_time_past_is_the_middle_timestamp() {
    let mut index = BlockIndex::new();
    let g = genesis();
    index.insert(g.clone()).unwrap();

    let mut parent = g.hash();
    for height in 1..=4u32 {
        // Deliberately unsorted times: 40, 10, 30, 20 seconds after base.
        let time = [40, 10, 30, 20][(height - 1) as usize];
        let block = build_block(&parent, height, height as u8, time, EASY_BITS, Vec::new());
        parent = block.hash();
        index.insert(block).unwrap();
    }

    let tip = index.tip().unwrap();
    // Times are base+0 (genesis), +40, +10, +30, +20; sorted middle is +20.
    assert_eq!(
        index.median_time_past(tip),
        Utc.timestamp_opt(1_600_000_020, 0).unwrap(),
    );
}

#[test]
fn locator_walks_back_with_doubling_strides() {
    let mut index = BlockIndex::new();
    let g = genesis();
    index.insert(g.clone()).unwrap();

    let mut hashes = vec![g.hash()];
    let mut parent = g.hash();
    for height in 1..=40u32 {
        let block = build_block(&parent, height, height as u8, height, EASY_BITS, Vec::new());
        parent = block.hash();
        hashes.push(block.hash());
        index.insert(block).unwrap();
    }

    let locator = index.locator();
    // Strides 1, 2, 4, 8, then 10s: heights 40, 39, 37, 33, 25, 15, 5, 0.
    let heights: Vec<u32> = locator
        .iter()
        .map(|hash| {
            let id = index.lookup(hash).expect("locator hashes are known");
            index.node(id).height.0
        })
        .collect();
    assert_eq!(heights, vec![40, 39, 37, 33, 25, 15, 5, 0]);
    assert_eq!(locator.last(), Some(&g.hash()));
}

#[test]
fn blocks_after_finds_the_fork_point() {
    let mut index = BlockIndex::new();
    let g = genesis();
    index.insert(g.clone()).unwrap();

    let mut parent = g.hash();
    let mut chain = vec![g.hash()];
    for height in 1..=5u32 {
        let block = build_block(&parent, height, height as u8, height, EASY_BITS, Vec::new());
        parent = block.hash();
        chain.push(block.hash());
        index.insert(block).unwrap();
    }

    // A peer that knows up to height 2 gets heights 3..=5.
    let successors = index.blocks_after(&[chain[2]], 500);
    assert_eq!(successors, chain[3..].to_vec());

    // A limit caps the answer.
    let successors = index.blocks_after(&[chain[2]], 2);
    assert_eq!(successors, chain[3..5].to_vec());

    // A peer that shares nothing is started from genesis.
    let successors = index.blocks_after(&[ferrite_chain::block::Hash([0xCD; 32])], 500);
    assert_eq!(successors, chain);
}

#[test]
fn utxo_set_connects_and_disconnects_blocks() {
    let mut utxos = UtxoSet::new();
    let g = genesis();
    utxos.connect_block(&g, Height(0)).unwrap();
    assert_eq!(utxos.len(), 1);

    // A block that spends the genesis coinbase into two outputs.
    let g_coinbase = g.transactions[0].hash();
    let spend = Arc::new(Transaction::new(
        1,
        vec![Input::PrevOut {
            outpoint: OutPoint {
                hash: g_coinbase,
                index: 0,
            },
            unlock_script: Script::empty(),
            sequence: Input::FINAL_SEQUENCE,
        }],
        vec![
            Output {
                value: Amount::from_sats(3_000_000_000),
                lock_script: Script::new(vec![0x51]),
            },
            Output {
                value: Amount::from_sats(2_000_000_000),
                lock_script: Script::new(vec![0x52]),
            },
        ],
        LockTime::unlocked(),
    ));
    let block1 = build_block(&g.hash(), 1, 1, 1, EASY_BITS, vec![spend.clone()]);
    utxos.connect_block(&block1, Height(1)).unwrap();

    // Genesis coinbase spent; block1 coinbase + two spend outputs live.
    assert!(!utxos.is_unspent(&OutPoint {
        hash: g_coinbase,
        index: 0
    }));
    assert_eq!(utxos.len(), 3);
    assert_eq!(
        utxos.balance(None),
        Amount::from_sats(10_000_000_000),
    );

    // Disconnecting restores the exact prior state.
    utxos.disconnect_block(&block1).unwrap();
    assert_eq!(utxos.len(), 1);
    assert!(utxos.is_unspent(&OutPoint {
        hash: g_coinbase,
        index: 0
    }));
    assert_eq!(utxos.balance(None), Amount::from_sats(5_000_000_000));
}

#[test]
fn disconnect_without_undo_data_fails_loudly() {
    let mut utxos = UtxoSet::new();
    let g = genesis();
    let block1 = build_block(&g.hash(), 1, 1, 1, EASY_BITS, Vec::new());

    // block1 was never connected, so its outputs are unknown.
    assert!(matches!(
        utxos.disconnect_block(&block1),
        Err(StateError::ReorgStateInconsistent(_))
    ));
}

#[test]
fn double_spend_within_a_block_fails_to_connect() {
    let mut utxos = UtxoSet::new();
    let g = genesis();
    utxos.connect_block(&g, Height(0)).unwrap();

    let g_coinbase = g.transactions[0].hash();
    let spend = |tag: u8| {
        Arc::new(Transaction::new(
            1,
            vec![Input::PrevOut {
                outpoint: OutPoint {
                    hash: g_coinbase,
                    index: 0,
                },
                unlock_script: Script::new(vec![1, tag]),
                sequence: Input::FINAL_SEQUENCE,
            }],
            vec![Output {
                value: Amount::from_sats(1),
                lock_script: Script::empty(),
            }],
            LockTime::unlocked(),
        ))
    };
    let block1 = build_block(
        &g.hash(),
        1,
        1,
        1,
        EASY_BITS,
        vec![spend(1), spend(2)],
    );
    assert!(matches!(
        utxos.connect_block(&block1, Height(1)),
        Err(StateError::MissingUtxo(_))
    ));
}
