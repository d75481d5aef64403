use thiserror::Error;

use ferrite_chain::SerializationError;

/// Peer-connection errors.
///
/// Everything here is recovered at the connection boundary: the offending
/// connection is dropped and the rest of the node is untouched.
#[derive(Error, Debug)]
pub enum PeerError {
    /// The peer closed the connection before completing the handshake.
    #[error("connection closed during handshake")]
    HandshakeFailed,

    /// The handshake nonce matched our own: we dialed ourselves.
    #[error("connected to self")]
    SelfConnection,

    /// A request to the peer timed out.
    #[error("peer request timed out")]
    Timeout,

    /// The peer stopped making progress and was declared stale.
    #[error("peer made no progress")]
    Stale,

    /// The peer sent bytes that did not decode.
    #[error("serialization: {0}")]
    Serialization(#[from] SerializationError),

    /// Socket-level failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
