use std::net::SocketAddr;

use clap::Parser;

/// ferrited — a from-scratch proof-of-work chain node.
#[derive(Parser)]
#[command(version, about)]
pub struct Args {
    /// Address to accept peer connections on.
    #[arg(long, default_value = "0.0.0.0:8433", env = "FERRITED_LISTEN")]
    pub listen: SocketAddr,

    /// Peer to dial at startup (repeatable).
    #[arg(long = "peer")]
    pub peers: Vec<SocketAddr>,

    /// Mine blocks on a dedicated thread.
    #[arg(long)]
    pub mine: bool,

    /// Compressed secp256k1 public key (hex) to pay block rewards to.
    /// When mining without one, a throwaway key is generated and logged.
    #[arg(long, env = "FERRITED_MINER_PUBKEY")]
    pub miner_pubkey: Option<String>,

    /// Log filter, in RUST_LOG syntax. The RUST_LOG environment variable
    /// takes precedence.
    #[arg(long, default_value = "info", env = "FERRITED_LOG")]
    pub log_filter: String,
}
