//! Network configuration.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Configuration for the gossip overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The address to accept inbound peers on.
    pub listen_addr: SocketAddr,
    /// Peers to dial at startup.
    pub initial_peers: Vec<SocketAddr>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            listen_addr: "0.0.0.0:8433"
                .parse()
                .expect("hard-coded listen address parses"),
            initial_peers: Vec::new(),
        }
    }
}
