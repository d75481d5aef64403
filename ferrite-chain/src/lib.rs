//! Core chain data structures and consensus-critical serialization.
//!
//! This crate defines the canonical wire encodings of transactions, blocks
//! and headers, the compact difficulty encoding, and the monetary amount
//! type. Everything here is consensus-critical: a single changed byte in an
//! encoding changes transaction and block identities.

pub mod amount;
pub mod block;
pub mod cached;
pub mod parameters;
pub mod script;
pub mod serialization;
pub mod transaction;
pub mod work;

mod fmt;

pub use serialization::{
    SerializationError, WireDeserialize, WireDeserializeInto, WireSerialize,
};
