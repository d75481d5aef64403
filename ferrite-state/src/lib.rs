//! In-memory chain state primitives.
//!
//! This crate owns the three mutable structures behind the node: the
//! [`UtxoSet`] (what is spendable), the [`BlockIndex`] (every known block,
//! arranged as a tree with a best-work tip), and the [`Mempool`]
//! (unconfirmed transactions). Composition under a single lock, validation,
//! and reorganization policy live a layer up, in the consensus crate.

pub mod index;
pub mod mempool;
pub mod utxo;

mod error;

pub use error::StateError;
pub use index::{BlockIndex, Insertion, NodeId};
pub use mempool::Mempool;
pub use utxo::{Utxo, UtxoSet};
