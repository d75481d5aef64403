//! Definitions of network messages.

use std::sync::Arc;

use ferrite_chain::{block::Block, transaction::Transaction};

use super::get_blocks::GetBlocks;
use super::inv::InventoryHash;

/// A peer-protocol message.
///
/// The wire format identifies messages by a 12-byte ascii command string;
/// internally that is a serialization detail and the enum discriminant is
/// the identity. Translation between the two happens only in the codec,
/// which gives one clearly-defined validation boundary for network input.
#[derive(Clone, Debug)]
pub enum Message {
    /// Handshake hello: protocol version, the sender's best height, and a
    /// nonce for detecting self-connections.
    Version {
        /// The protocol version spoken.
        version: u32,
        /// The sender's best-chain height, which seeds sync decisions.
        best_height: u32,
        /// Random per-node value; seeing our own means we dialed ourselves.
        nonce: u64,
    },

    /// Handshake acknowledgement.
    Verack,

    /// Advertise knowledge of blocks or transactions. Sent unsolicited on
    /// new data, or in reply to `GetBlocks`.
    Inv(Vec<InventoryHash>),

    /// Request the data behind advertised hashes.
    GetData(Vec<InventoryHash>),

    /// A serialized block.
    Block(Arc<Block>),

    /// A serialized loose transaction.
    Tx(Arc<Transaction>),

    /// Request an inventory of block hashes following a locator fork
    /// point.
    GetBlocks(GetBlocks),
}

impl Message {
    /// The wire command naming this message.
    pub fn command(&self) -> Command {
        match self {
            Message::Version { .. } => Command::Version,
            Message::Verack => Command::Verack,
            Message::Inv(_) => Command::Inv,
            Message::GetData(_) => Command::GetData,
            Message::Block(_) => Command::Block,
            Message::Tx(_) => Command::Tx,
            Message::GetBlocks(_) => Command::GetBlocks,
        }
    }
}

/// The 12-byte ascii command strings used in message headers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Version,
    Verack,
    Inv,
    GetData,
    Block,
    Tx,
    GetBlocks,
}

impl Command {
    /// The zero-padded wire form of this command.
    pub fn bytes(&self) -> &'static [u8; 12] {
        match self {
            Command::Version => b"version\0\0\0\0\0",
            Command::Verack => b"verack\0\0\0\0\0\0",
            Command::Inv => b"inv\0\0\0\0\0\0\0\0\0",
            Command::GetData => b"getdata\0\0\0\0\0",
            Command::Block => b"block\0\0\0\0\0\0\0",
            Command::Tx => b"tx\0\0\0\0\0\0\0\0\0\0",
            Command::GetBlocks => b"getblocks\0\0\0",
        }
    }

    /// Decode a wire command; `None` for anything unrecognized.
    pub fn from_bytes(bytes: &[u8; 12]) -> Option<Command> {
        match bytes {
            b"version\0\0\0\0\0" => Some(Command::Version),
            b"verack\0\0\0\0\0\0" => Some(Command::Verack),
            b"inv\0\0\0\0\0\0\0\0\0" => Some(Command::Inv),
            b"getdata\0\0\0\0\0" => Some(Command::GetData),
            b"block\0\0\0\0\0\0\0" => Some(Command::Block),
            b"tx\0\0\0\0\0\0\0\0\0\0" => Some(Command::Tx),
            b"getblocks\0\0\0" => Some(Command::GetBlocks),
            _ => None,
        }
    }
}
