//! Wire-format impls for transactions and their parts, so that all of the
//! transaction serialization logic is in one place.

use std::io::{self, Read};

use crate::{
    amount::Amount,
    script::Script,
    serialization::{CompactInt, SerializationError, WireDeserialize, WireSerialize},
};

use super::{CoinbaseData, Input, LockTime, OutPoint, Output, Transaction};

/// The maximum serialized size of a transaction, in bytes.
pub const MAX_TX_SIZE: u64 = 1_000_000;

impl WireSerialize for OutPoint {
    fn wire_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.hash.wire_serialize(&mut writer)?;
        self.index.wire_serialize(&mut writer)
    }
}

impl WireDeserialize for OutPoint {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(OutPoint {
            hash: super::Hash::wire_deserialize(&mut reader)?,
            index: u32::wire_deserialize(&mut reader)?,
        })
    }
}

impl WireSerialize for CoinbaseData {
    fn wire_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        CompactInt::from(self.0.len()).wire_serialize(&mut writer)?;
        writer.write_all(&self.0[..])
    }
}

impl WireDeserialize for CoinbaseData {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = CompactInt::wire_deserialize(&mut reader)?.value();
        let mut bytes = Vec::new();
        reader.take(len).read_to_end(&mut bytes)?;
        if (bytes.len() as u64) < len {
            return Err(SerializationError::Parse("truncated coinbase data"));
        }
        Ok(CoinbaseData(bytes))
    }
}

impl WireSerialize for Input {
    fn wire_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        match self {
            Input::PrevOut {
                outpoint,
                unlock_script,
                sequence,
            } => {
                outpoint.wire_serialize(&mut writer)?;
                unlock_script.wire_serialize(&mut writer)?;
                sequence.wire_serialize(&mut writer)
            }
            Input::Coinbase { data, sequence } => {
                OutPoint::null().wire_serialize(&mut writer)?;
                data.wire_serialize(&mut writer)?;
                sequence.wire_serialize(&mut writer)
            }
        }
    }
}

impl WireDeserialize for Input {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        // The two variants share a wire format; the null outpoint is the
        // discriminant.
        let outpoint = OutPoint::wire_deserialize(&mut reader)?;
        if outpoint.is_null() {
            let data = CoinbaseData::wire_deserialize(&mut reader)?;
            let sequence = u32::wire_deserialize(&mut reader)?;
            Ok(Input::Coinbase { data, sequence })
        } else {
            let unlock_script = Script::wire_deserialize(&mut reader)?;
            let sequence = u32::wire_deserialize(&mut reader)?;
            Ok(Input::PrevOut {
                outpoint,
                unlock_script,
                sequence,
            })
        }
    }
}

impl WireSerialize for Output {
    fn wire_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.value.wire_serialize(&mut writer)?;
        self.lock_script.wire_serialize(&mut writer)
    }
}

impl WireDeserialize for Output {
    fn wire_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Output {
            value: Amount::wire_deserialize(&mut reader)?,
            lock_script: Script::wire_deserialize(&mut reader)?,
        })
    }
}

impl WireSerialize for Transaction {
    fn wire_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.version.wire_serialize(&mut writer)?;
        self.inputs.wire_serialize(&mut writer)?;
        self.outputs.wire_serialize(&mut writer)?;
        self.lock_time.wire_serialize(&mut writer)
    }
}

/// Deserializes a transaction, calculating and caching its txid.
impl WireDeserialize for Transaction {
    fn wire_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        // A transaction can never legitimately exceed a megabyte, so cap the
        // reader before trusting any embedded lengths.
        let mut reader = reader.take(MAX_TX_SIZE);
        let version = i32::wire_deserialize(&mut reader)?;
        let inputs = <Vec<Input>>::wire_deserialize(&mut reader)?;
        let outputs = <Vec<Output>>::wire_deserialize(&mut reader)?;
        let lock_time = LockTime::wire_deserialize(&mut reader)?;
        let mut transaction = Transaction::new(version, inputs, outputs, lock_time);
        transaction.cache_hash();
        Ok(transaction)
    }
}
