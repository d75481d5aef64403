//! Streaming double-SHA256 (SHA256d), the hash behind every chain identity.

use sha2::{Digest, Sha256};
use std::io;

/// A [`io::Write`] instance that produces a SHA256d digest of everything
/// written to it. Hashing a value through its `WireSerialize` impl avoids
/// materializing the serialization just to hash it.
#[derive(Default)]
pub struct Writer {
    hash: Sha256,
}

impl Writer {
    /// Consume the writer and produce the 32-byte digest.
    pub fn finish(self) -> [u8; 32] {
        let first = self.hash.finalize();
        let second = Sha256::digest(first);
        let mut buffer = [0u8; 32];
        buffer.copy_from_slice(&second);
        buffer
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hash.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Double-SHA256 of `data` in one call.
pub fn hash(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut buffer = [0u8; 32];
    buffer.copy_from_slice(&second);
    buffer
}

/// The first four bytes of a SHA256d digest, used as a message checksum in
/// the peer protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Checksum(pub [u8; 4]);

impl<'a> From<&'a [u8]> for Checksum {
    fn from(bytes: &'a [u8]) -> Self {
        let digest = hash(bytes);
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&digest[0..4]);
        Checksum(checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn streaming_matches_oneshot() {
        let data = b"the quick brown fox";
        let mut writer = Writer::default();
        writer.write_all(&data[..7]).unwrap();
        writer.write_all(&data[7..]).unwrap();
        assert_eq!(writer.finish(), hash(data));
    }
}
