//! The ferrite node daemon: chain state, gossip overlay, and (optionally)
//! a mining thread, wired together and torn down on ctrl-c.

mod cli;

use std::sync::atomic::Ordering;

use clap::Parser;
use color_eyre::eyre::{ensure, Result, WrapErr};
use tracing::info;

use ferrite_chain::script::Script;
use ferrite_consensus::ChainState;
use ferrite_miner::Miner;
use ferrite_script::builder;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_filter)),
        )
        .init();

    let chain = ChainState::new();

    let network_config = ferrite_network::Config {
        listen_addr: args.listen,
        initial_peers: args.peers.clone(),
    };
    let (peers, dispatcher) = ferrite_network::start(chain.clone(), network_config)
        .await
        .wrap_err("failed to start the gossip overlay")?;

    let miner = if args.mine {
        let script = miner_script(&args)?;
        let miner = Miner::new(chain.clone(), script);
        let stop = miner.stop_handle();
        let thread = std::thread::Builder::new()
            .name("miner".into())
            .spawn(move || miner.run())
            .wrap_err("failed to spawn the miner thread")?;
        info!("mining enabled");
        Some((thread, stop))
    } else {
        None
    };

    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    // Orderly teardown: stop the miner, close the sockets, then drop the
    // dispatcher once its event sources are gone.
    if let Some((thread, stop)) = miner {
        stop.store(true, Ordering::Relaxed);
        let _ = thread.join();
    }
    peers.shutdown();
    dispatcher.abort();

    if let Some(height) = chain.tip_height() {
        info!(height = height.0, "final chain height");
    }
    Ok(())
}

/// The script block rewards are paid to: pay-to-public-key-hash of the
/// configured key, or of a freshly generated throwaway key.
fn miner_script(args: &cli::Args) -> Result<Script> {
    let pubkey = match &args.miner_pubkey {
        Some(hex_key) => hex::decode(hex_key).wrap_err("miner public key is not valid hex")?,
        None => {
            let secp = secp256k1::Secp256k1::new();
            let (_, public) = secp.generate_keypair(&mut secp256k1::rand::thread_rng());
            let bytes = public.serialize().to_vec();
            info!(pubkey = %hex::encode(&bytes), "generated throwaway mining key");
            bytes
        }
    };
    ensure!(
        matches!(pubkey.len(), 33 | 65),
        "miner public key must be 33 or 65 bytes",
    );
    Ok(builder::p2pkh(&pubkey))
}
