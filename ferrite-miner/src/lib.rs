//! Candidate assembly and the proof-of-work loop.
//!
//! The miner reads the tip exactly once per candidate. While the nonce
//! sweep runs, a watch channel carries tip changes; the sweep checks it
//! once per batch and abandons stale candidates instead of finishing them.

use std::cmp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use ferrite_chain::{
    amount::Amount,
    block::{self, merkle, Block, Header, Height},
    parameters::GENESIS_PREVIOUS_BLOCK_HASH,
    script::Script,
    serialization::sha256d,
    transaction::{CoinbaseData, Input, LockTime, Output, Transaction},
    WireSerialize,
};
use ferrite_consensus::{difficulty, subsidy, ChainState};
use ferrite_script::builder;

/// Nonces tried between cancellation checks.
const NONCE_BATCH: u64 = 4096;

/// Timestamp bumps attempted before a candidate is abandoned as
/// unminable.
const MAX_TIME_BUMPS: u32 = 100;

/// Byte offsets of the mutable header fields within the 80-byte
/// serialization.
const TIME_OFFSET: usize = 68;
const NONCE_OFFSET: usize = 76;

/// The outcome of one mining attempt.
#[derive(Debug)]
pub enum MineOutcome {
    /// The candidate met its target.
    Mined(Arc<Block>),
    /// The tip moved (or shutdown was requested); the candidate is stale.
    Cancelled,
    /// The nonce space, including time bumps, was exhausted.
    Exhausted,
}

/// Assembles candidate blocks over the chain state and sweeps nonces.
pub struct Miner {
    chain: ChainState,
    script_pubkey: Script,
    extra_data: Vec<u8>,
    stop: Arc<AtomicBool>,
}

impl Miner {
    /// A miner paying rewards to `script_pubkey`.
    pub fn new(chain: ChainState, script_pubkey: Script) -> Miner {
        Miner {
            chain,
            script_pubkey,
            extra_data: b"ferrite".to_vec(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A flag that makes the mining loop wind down cooperatively.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Assemble a candidate block on the current tip: next difficulty,
    /// height-tagged coinbase claiming subsidy plus mempool fees, and a
    /// time no earlier than the median time past.
    pub fn build_candidate(&self) -> Block {
        let (prev_hash, height, bits, median_time_past) = self.chain.with_index(|index| {
            let bits = difficulty::next_work_required(index);
            match index.tip() {
                Some(tip) => {
                    let node = index.node(tip);
                    (
                        Some(node.hash),
                        node.height.next(),
                        bits,
                        Some(index.median_time_past(tip)),
                    )
                }
                None => (None, Height(0), bits, None),
            }
        });

        // Mempool transactions ride along with their fees; anything whose
        // inputs no longer resolve is left behind.
        let mut included: Vec<Arc<Transaction>> = Vec::new();
        let mut fees = Amount::ZERO;
        if prev_hash.is_some() {
            let staged = self.chain.mempool_transactions();
            self.chain.with_utxos(|utxos| {
                for tx in staged {
                    match subsidy::transaction_fee(&tx, utxos) {
                        Some(fee) => match fees.checked_add(fee) {
                            Some(total) => {
                                fees = total;
                                included.push(tx);
                            }
                            None => break,
                        },
                        None => debug!(txid = %tx.hash(), "skipping unresolvable transaction"),
                    }
                }
            });
        }

        let reward = subsidy::block_subsidy()
            .checked_add(fees)
            .expect("subsidy plus bounded fees stays in range");
        let coinbase = Arc::new(Transaction::new(
            1,
            vec![Input::Coinbase {
                data: CoinbaseData(builder::coinbase_data(height.0, &self.extra_data)),
                sequence: Input::FINAL_SEQUENCE,
            }],
            vec![Output {
                value: reward,
                lock_script: self.script_pubkey.clone(),
            }],
            LockTime::unlocked(),
        ));

        let mut transactions = vec![coinbase];
        transactions.extend(included);
        let merkle_root: merkle::Root = transactions.iter().map(|tx| tx.hash()).collect();

        // Wall clock, but never behind the median time past; truncated to
        // the second precision the wire format carries.
        let now = Utc
            .timestamp_opt(Utc::now().timestamp(), 0)
            .single()
            .expect("the current time is representable");
        let time = match median_time_past {
            Some(median) => cmp::max(median, now),
            None => now,
        };

        let header = Header::new(
            1,
            prev_hash.unwrap_or(GENESIS_PREVIOUS_BLOCK_HASH),
            merkle_root,
            time,
            bits,
            0,
        );
        Block {
            header,
            transactions,
        }
    }

    /// Sweep the nonce space for `block`, bumping the timestamp when a full
    /// sweep comes up empty.
    ///
    /// The hash is computed over a preserialized 80-byte header with the
    /// nonce (and time) patched in place, so the sweep allocates nothing.
    /// `cancel` is checked once per batch.
    pub fn mine(
        &self,
        block: &mut Block,
        cancel: &mut watch::Receiver<Option<block::Hash>>,
    ) -> MineOutcome {
        let target = match block.header.difficulty_threshold.to_expanded() {
            Some(target) => target,
            None => return MineOutcome::Exhausted,
        };

        let mut header_bytes = block
            .header
            .wire_serialize_to_vec()
            .expect("writing to a vec never fails");

        for _ in 0..MAX_TIME_BUMPS {
            let mut nonce: u64 = 0;
            while nonce <= u64::from(u32::MAX) {
                let batch_end = cmp::min(nonce + NONCE_BATCH, u64::from(u32::MAX) + 1);
                while nonce < batch_end {
                    header_bytes[NONCE_OFFSET..NONCE_OFFSET + 4]
                        .copy_from_slice(&(nonce as u32).to_le_bytes());
                    let hash = block::Hash(sha256d::hash(&header_bytes));
                    if hash <= target {
                        block.header.nonce = nonce as u32;
                        return MineOutcome::Mined(Arc::new(block.clone()));
                    }
                    nonce += 1;
                }
                if self.stop.load(Ordering::Relaxed) || cancel.has_changed().unwrap_or(true) {
                    let _ = cancel.borrow_and_update();
                    return MineOutcome::Cancelled;
                }
            }

            // Sweep exhausted: move time forward one second and go again.
            block.header.time += chrono::Duration::seconds(1);
            header_bytes[TIME_OFFSET..TIME_OFFSET + 4]
                .copy_from_slice(&(block.header.time.timestamp() as u32).to_le_bytes());
        }
        MineOutcome::Exhausted
    }

    /// Mine continuously: rebuild the candidate whenever the tip moves,
    /// submit whatever gets mined, stop when the stop flag is raised.
    /// Meant for a dedicated OS thread.
    pub fn run(&self) {
        let mut tip_watch = self.chain.tip_watch();
        while !self.stop.load(Ordering::Relaxed) {
            let _ = tip_watch.borrow_and_update();
            let mut candidate = self.build_candidate();
            match self.mine(&mut candidate, &mut tip_watch) {
                MineOutcome::Mined(mined) => {
                    info!(
                        hash = %mined.hash(),
                        height = ?mined.coinbase_height(),
                        transactions = mined.transactions.len(),
                        "mined block",
                    );
                    if let Err(err) = self.chain.commit_block(mined) {
                        warn!(%err, "mined block rejected");
                    }
                }
                MineOutcome::Cancelled => debug!("candidate stale, rebuilding"),
                MineOutcome::Exhausted => warn!("candidate unminable, rebuilding"),
            }
        }
        info!("miner stopped");
    }
}
