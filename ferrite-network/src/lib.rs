//! The gossip overlay and initial block download.
//!
//! Serialized blocks and transactions move between peers over framed TCP
//! connections. Every inbound message lands on one queue consumed by a
//! single [`dispatch::Dispatcher`], which routes through an exhaustive
//! match: validation and state changes stay serial even though socket IO is
//! fully concurrent.

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod ibd;
pub mod node;
pub mod peer;
pub mod protocol;

mod error;

pub use config::Config;
pub use error::PeerError;
pub use node::start;
pub use peer::{PeerEvent, PeerId, PeerSet};
pub use protocol::message::Message;
