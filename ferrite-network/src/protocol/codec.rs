//! A tokio codec mapping byte streams to message streams.
//!
//! Frames carry a 24-byte header: 4 bytes of network magic, the 12-byte
//! command, a 4-byte little-endian body length, and the first 4 bytes of
//! the body's SHA256d digest as a checksum.

use std::io::Cursor;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use ferrite_chain::{
    block::Block,
    serialization::{
        sha256d, wire_deserialize_exact, SerializationError, WireDeserialize, WireSerialize,
    },
    transaction::Transaction,
};

use crate::constants::{HEADER_LEN, MAGIC, MAX_INV_ITEMS, MAX_PROTOCOL_MESSAGE_LEN};

use super::{
    get_blocks::GetBlocks,
    inv::InventoryHash,
    message::{Command, Message},
};

/// A codec which produces messages from byte streams and vice versa.
#[derive(Debug, Default)]
pub struct Codec {
    state: DecodeState,
}

#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    Head,
    Body {
        command: Command,
        body_len: usize,
        checksum: sha256d::Checksum,
    },
}

impl Codec {
    /// A codec in its initial state.
    pub fn new() -> Codec {
        Codec::default()
    }

    fn write_body<W: std::io::Write>(
        message: &Message,
        mut writer: W,
    ) -> Result<(), std::io::Error> {
        match message {
            Message::Version {
                version,
                best_height,
                nonce,
            } => {
                version.wire_serialize(&mut writer)?;
                best_height.wire_serialize(&mut writer)?;
                nonce.wire_serialize(&mut writer)?;
            }
            Message::Verack => { /* empty payload */ }
            Message::Inv(items) | Message::GetData(items) => {
                items.wire_serialize(&mut writer)?;
            }
            Message::Block(block) => block.wire_serialize(&mut writer)?,
            Message::Tx(tx) => tx.wire_serialize(&mut writer)?,
            Message::GetBlocks(request) => request.wire_serialize(&mut writer)?,
        }
        Ok(())
    }

    fn read_body(command: Command, body: &[u8]) -> Result<Message, SerializationError> {
        match command {
            Command::Version => {
                let mut cursor = Cursor::new(body);
                let version = u32::wire_deserialize(&mut cursor)?;
                let best_height = u32::wire_deserialize(&mut cursor)?;
                let nonce = u64::wire_deserialize(&mut cursor)?;
                if (cursor.position() as usize) < body.len() {
                    return Err(SerializationError::TrailingBytes);
                }
                Ok(Message::Version {
                    version,
                    best_height,
                    nonce,
                })
            }
            Command::Verack => {
                if !body.is_empty() {
                    return Err(SerializationError::TrailingBytes);
                }
                Ok(Message::Verack)
            }
            Command::Inv => Ok(Message::Inv(Self::read_inventory(body)?)),
            Command::GetData => Ok(Message::GetData(Self::read_inventory(body)?)),
            Command::Block => {
                let block: Block = wire_deserialize_exact(body)?;
                Ok(Message::Block(Arc::new(block)))
            }
            Command::Tx => {
                let tx: Transaction = wire_deserialize_exact(body)?;
                Ok(Message::Tx(Arc::new(tx)))
            }
            Command::GetBlocks => Ok(Message::GetBlocks(wire_deserialize_exact(body)?)),
        }
    }

    fn read_inventory(body: &[u8]) -> Result<Vec<InventoryHash>, SerializationError> {
        let items: Vec<InventoryHash> = wire_deserialize_exact(body)?;
        if items.len() > MAX_INV_ITEMS {
            return Err(SerializationError::Parse("oversized inventory"));
        }
        Ok(items)
    }
}

impl Encoder<Message> for Codec {
    type Error = SerializationError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = Vec::new();
        Self::write_body(&item, &mut body)?;
        if body.len() > MAX_PROTOCOL_MESSAGE_LEN {
            return Err(SerializationError::Parse(
                "message body exceeds the protocol limit",
            ));
        }
        trace!(command = ?item.command(), len = body.len(), "encoding message");

        let mut header = [0u8; HEADER_LEN];
        {
            let mut writer = Cursor::new(&mut header[..]);
            std::io::Write::write_all(&mut writer, &MAGIC)?;
            std::io::Write::write_all(&mut writer, item.command().bytes())?;
            writer.write_u32::<LittleEndian>(body.len() as u32)?;
            std::io::Write::write_all(&mut writer, &sha256d::Checksum::from(&body[..]).0)?;
        }

        dst.reserve(HEADER_LEN + body.len());
        dst.extend_from_slice(&header);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

impl Decoder for Codec {
    type Item = Message;
    type Error = SerializationError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                DecodeState::Head => {
                    if src.len() < HEADER_LEN {
                        return Ok(None);
                    }

                    let mut header = Cursor::new(&src[..HEADER_LEN]);
                    let mut magic = [0u8; 4];
                    std::io::Read::read_exact(&mut header, &mut magic)?;
                    if magic != MAGIC {
                        return Err(SerializationError::Parse("wrong network magic"));
                    }
                    let mut command_bytes = [0u8; 12];
                    std::io::Read::read_exact(&mut header, &mut command_bytes)?;
                    let command = Command::from_bytes(&command_bytes)
                        .ok_or(SerializationError::Parse("unknown command"))?;
                    let body_len = header.read_u32::<LittleEndian>()? as usize;
                    if body_len > MAX_PROTOCOL_MESSAGE_LEN {
                        return Err(SerializationError::Parse(
                            "message body exceeds the protocol limit",
                        ));
                    }
                    let mut checksum = [0u8; 4];
                    std::io::Read::read_exact(&mut header, &mut checksum)?;

                    src.advance(HEADER_LEN);
                    src.reserve(body_len);
                    self.state = DecodeState::Body {
                        command,
                        body_len,
                        checksum: sha256d::Checksum(checksum),
                    };
                }
                DecodeState::Body {
                    command,
                    body_len,
                    checksum,
                } => {
                    if src.len() < body_len {
                        return Ok(None);
                    }
                    let body = src.split_to(body_len);
                    self.state = DecodeState::Head;

                    if sha256d::Checksum::from(&body[..]) != checksum {
                        return Err(SerializationError::Parse("checksum mismatch"));
                    }
                    let message = Self::read_body(command, &body)?;
                    trace!(command = ?command, len = body_len, "decoded message");
                    return Ok(Some(message));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_chain::{block, transaction};

    fn roundtrip(message: Message) -> Message {
        let mut codec = Codec::new();
        let mut buffer = BytesMut::new();
        codec.encode(message, &mut buffer).expect("encodes");
        codec
            .decode(&mut buffer)
            .expect("decodes")
            .expect("one full frame")
    }

    #[test]
    fn version_roundtrip() {
        match roundtrip(Message::Version {
            version: 1,
            best_height: 42,
            nonce: 0xDEAD_BEEF,
        }) {
            Message::Version {
                version,
                best_height,
                nonce,
            } => {
                assert_eq!(version, 1);
                assert_eq!(best_height, 42);
                assert_eq!(nonce, 0xDEAD_BEEF);
            }
            other => panic!("wrong message: {other:?}"),
        }
    }

    #[test]
    fn verack_roundtrip() {
        assert!(matches!(roundtrip(Message::Verack), Message::Verack));
    }

    #[test]
    fn inventory_roundtrip() {
        let items = vec![
            InventoryHash::Block(block::Hash([7; 32])),
            InventoryHash::Tx(transaction::Hash([9; 32])),
        ];
        match roundtrip(Message::Inv(items.clone())) {
            Message::Inv(decoded) => assert_eq!(decoded, items),
            other => panic!("wrong message: {other:?}"),
        }
    }

    #[test]
    fn getblocks_roundtrip() {
        let request = GetBlocks {
            known_blocks: vec![block::Hash([1; 32])],
            stop_hash: None,
        };
        match roundtrip(Message::GetBlocks(request.clone())) {
            Message::GetBlocks(decoded) => assert_eq!(decoded, request),
            other => panic!("wrong message: {other:?}"),
        }
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let mut codec = Codec::new();
        let mut buffer = BytesMut::new();
        codec.encode(Message::Verack, &mut buffer).unwrap();

        let mut partial = BytesMut::from(&buffer[..HEADER_LEN - 3]);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut codec = Codec::new();
        let mut buffer = BytesMut::new();
        codec.encode(Message::Verack, &mut buffer).unwrap();
        buffer[0] ^= 0xFF;
        assert!(codec.decode(&mut buffer).is_err());
    }

    #[test]
    fn corrupted_bodies_fail_the_checksum() {
        let mut codec = Codec::new();
        let mut buffer = BytesMut::new();
        codec
            .encode(
                Message::Inv(vec![InventoryHash::Block(block::Hash([7; 32]))]),
                &mut buffer,
            )
            .unwrap();
        let last = buffer.len() - 1;
        buffer[last] ^= 0xFF;
        assert!(codec.decode(&mut buffer).is_err());
    }
}
