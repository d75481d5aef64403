//! Out-of-order block delivery: orphans are buffered until their parent
//! connects, then flushed in height order.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use ferrite_chain::{
    amount::Amount,
    block::{merkle, Block, Header, Height},
    parameters::{BLOCK_SUBSIDY, GENESIS_PREVIOUS_BLOCK_HASH},
    script::Script,
    transaction::{CoinbaseData, Input, LockTime, Output, Transaction},
    work::difficulty::CompactDifficulty,
};
use ferrite_consensus::ChainState;
use ferrite_network::{ibd::Ibd, PeerSet};

const EASY_BITS: CompactDifficulty = CompactDifficulty(0x207fffff);

fn mine_block(parent: Option<&Arc<Block>>, height: u32, tag: u8) -> Arc<Block> {
    let mut data = vec![4u8];
    data.extend_from_slice(&height.to_le_bytes());
    data.push(tag);
    let transactions = vec![Arc::new(Transaction::new(
        1,
        vec![Input::Coinbase {
            data: CoinbaseData(data),
            sequence: Input::FINAL_SEQUENCE,
        }],
        vec![Output {
            value: BLOCK_SUBSIDY,
            lock_script: Script::new(vec![0x51]),
        }],
        LockTime::unlocked(),
    ))];
    let merkle_root: merkle::Root = transactions.iter().map(|tx| tx.hash()).collect();
    let prev_hash = parent
        .map(|block| block.hash())
        .unwrap_or(GENESIS_PREVIOUS_BLOCK_HASH);
    let mut header = Header::new(
        1,
        prev_hash,
        merkle_root,
        Utc.timestamp_opt(1_600_000_000 + i64::from(height) * 600, 0)
            .unwrap(),
        EASY_BITS,
        0,
    );
    let target = EASY_BITS.to_expanded().unwrap();
    for nonce in 0u32.. {
        header.nonce = nonce;
        if header.hash() <= target {
            break;
        }
    }
    Arc::new(Block {
        header,
        transactions,
    })
}

#[test]
fn orphan_connects_after_its_parent() {
    let chain = ChainState::new();
    let (peers, _events) = PeerSet::new(chain.clone());
    let mut ibd = Ibd::new();

    let genesis = mine_block(None, 0, 0);
    let block1 = mine_block(Some(&genesis), 1, 1);
    let block2 = mine_block(Some(&block1), 2, 2);

    chain.commit_block(genesis.clone()).unwrap();

    // Height 2 arrives before its height-1 parent: buffered, not chained.
    ibd.buffer_orphan(block2.clone());
    assert!(ibd.has_buffered(&block2.hash()));
    ibd.drain(&chain, &peers);
    assert_eq!(chain.tip_hash(), Some(genesis.hash()));
    assert!(!chain.contains_block(&block2.hash()));

    // Once the parent connects, the buffered block follows and becomes
    // the tip.
    chain.commit_block(block1.clone()).unwrap();
    ibd.drain(&chain, &peers);
    assert_eq!(chain.tip_hash(), Some(block2.hash()));
    assert_eq!(chain.tip_height(), Some(Height(2)));
    assert!(!ibd.has_buffered(&block2.hash()));
}

#[test]
fn a_deep_buffer_flushes_in_one_drain() {
    let chain = ChainState::new();
    let (peers, _events) = PeerSet::new(chain.clone());
    let mut ibd = Ibd::new();

    let genesis = mine_block(None, 0, 0);
    let block1 = mine_block(Some(&genesis), 1, 1);
    let block2 = mine_block(Some(&block1), 2, 2);
    let block3 = mine_block(Some(&block2), 3, 3);

    chain.commit_block(genesis.clone()).unwrap();

    // Arrivals in reverse order all land in the buffer.
    ibd.buffer_orphan(block3.clone());
    ibd.buffer_orphan(block2.clone());
    ibd.buffer_orphan(block1.clone());

    // One drain chains all three in height order.
    ibd.drain(&chain, &peers);
    assert_eq!(chain.tip_hash(), Some(block3.hash()));
    assert_eq!(chain.tip_height(), Some(Height(3)));
}

#[test]
fn seen_hashes_short_circuit_relay() {
    let chain = ChainState::new();
    let (peers, _events) = PeerSet::new(chain);

    let hash = [0x5A; 32];
    assert!(peers.mark_seen(hash));
    assert!(!peers.mark_seen(hash));
    assert!(peers.is_seen(&hash));
}
