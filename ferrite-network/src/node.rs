//! Wiring: bring up the listener, dispatcher, and tip announcements.

use tokio::task::JoinHandle;
use tracing::info;

use ferrite_consensus::ChainState;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::peer::PeerSet;
use crate::protocol::{inv::InventoryHash, message::Message};

/// Start the gossip stack over `chain`.
///
/// Binds the listener, dials the configured peers, spawns the dispatcher,
/// and subscribes to chain updates so every newly committed block is
/// announced exactly once. Returns the peer set handle (for shutdown and
/// introspection) and the dispatcher task.
pub async fn start(
    chain: ChainState,
    config: Config,
) -> std::io::Result<(PeerSet, JoinHandle<()>)> {
    let (peers, events) = PeerSet::new(chain.clone());

    // Announce new tips to the network. mark_seen keeps the node from
    // re-relaying a block a peer echoes back.
    let announcer = peers.clone();
    chain.subscribe(move |block| {
        let hash = block.hash();
        if announcer.mark_seen(hash.0) {
            announcer.broadcast(Message::Inv(vec![InventoryHash::Block(hash)]), None);
        }
    });

    peers.listen(config.listen_addr).await?;
    for addr in &config.initial_peers {
        info!(%addr, "dialing initial peer");
        peers.connect(*addr);
    }

    let dispatcher = Dispatcher::new(chain, peers.clone());
    let dispatcher_task = tokio::spawn(dispatcher.run(events));

    Ok((peers, dispatcher_task))
}
