//! A memo field that is never part of the consensus serialization.

use serde::{Deserialize, Serialize};

use crate::serialization::{SerializationError, WireDeserialize, WireSerialize};

/// A `Cached` value is an option that does not participate in serialization
/// or (when absent on either side) equality.
///
/// It can be added to any consensus struct without risking a consensus
/// break: serializing writes nothing, deserializing reads nothing, and two
/// values compare equal whenever either cache is empty.
#[derive(Clone, Copy, Eq, Serialize, Deserialize)]
pub struct Cached<T: Clone + Copy>(Option<T>);

impl<T: Clone + Copy> Cached<T> {
    /// An empty cache.
    pub fn new() -> Cached<T> {
        Cached(None)
    }

    /// A populated cache.
    pub fn from(val: T) -> Cached<T> {
        Cached(Some(val))
    }

    /// The cached value, if present.
    pub fn value(&self) -> Option<T> {
        self.0
    }
}

impl<T: Clone + Copy> Default for Cached<T> {
    fn default() -> Self {
        Cached::new()
    }
}

/// Returns false only if both sides have a populated cache and the values
/// differ. This lets hand-constructed values (empty cache) compare equal to
/// their deserialized counterparts (cache populated during parsing).
impl<T: PartialEq + Copy> PartialEq for Cached<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self.0, other.0) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => true,
        }
    }
}

impl<T: Clone + Copy + std::fmt::Debug> std::fmt::Debug for Cached<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: Clone + Copy> WireSerialize for Cached<T> {
    fn wire_serialize<W: std::io::Write>(&self, _: W) -> Result<(), std::io::Error> {
        Ok(())
    }
}

impl<T: Clone + Copy> WireDeserialize for Cached<T> {
    fn wire_deserialize<R: std::io::Read>(_: R) -> Result<Self, SerializationError> {
        Ok(Cached(None))
    }
}
