//! The transaction merkle tree binding a header to its transactions.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::serialization::{sha256d, SerializationError, WireDeserialize, WireSerialize};
use crate::transaction;

/// The root of the transaction merkle tree.
///
/// The tree is built by pairwise SHA256d: each level hashes the
/// concatenation of adjacent pairs, and a level of odd length pairs its
/// trailing hash with itself. Because of that duplication, distinct
/// transaction lists can merkle-ize to the same root (CVE-2012-2459); the
/// block validator rejects duplicate txids for exactly that reason.
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Root(pub [u8; 32]);

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.write_str(&hex::encode(reversed_bytes))
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut reversed_bytes = self.0;
        reversed_bytes.reverse();
        f.debug_tuple("merkle::Root")
            .field(&hex::encode(reversed_bytes))
            .finish()
    }
}

impl FromIterator<transaction::Hash> for Root {
    fn from_iter<I>(hashes: I) -> Self
    where
        I: IntoIterator<Item = transaction::Hash>,
    {
        let mut level: Vec<[u8; 32]> = hashes.into_iter().map(|hash| hash.0).collect();
        if level.is_empty() {
            return Root([0; 32]);
        }
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                let last = *level.last().expect("level is non-empty");
                level.push(last);
            }
            level = level
                .chunks(2)
                .map(|pair| {
                    let mut concat = [0u8; 64];
                    concat[..32].copy_from_slice(&pair[0]);
                    concat[32..].copy_from_slice(&pair[1]);
                    sha256d::hash(&concat)
                })
                .collect();
        }
        Root(level[0])
    }
}

impl WireSerialize for Root {
    fn wire_serialize<W: io::Write>(&self, writer: W) -> Result<(), io::Error> {
        self.0.wire_serialize(writer)
    }
}

impl WireDeserialize for Root {
    fn wire_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Root(<[u8; 32]>::wire_deserialize(reader)?))
    }
}
