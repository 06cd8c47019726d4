//! Transaction output codec
//!
//! Outputs use the Bitcoin wire layout: an 8-byte little-endian value, a
//! CompactSize script length and the script itself. An output set is the
//! plain concatenation of serialized outputs; its double SHA-256 is the
//! commitment the ledger compares against.

use crate::core::state::StateError;
use crate::crypto::double_sha256;
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Script Opcodes
// =============================================================================

pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_CHECKSIG: u8 = 0xac;

// =============================================================================
// Codec Errors
// =============================================================================

/// Binary decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unexpected end of data: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("Non-minimal CompactSize encoding")]
    NonMinimalVarInt,
    #[error("Length {0} does not fit in memory")]
    LengthOverflow(u64),
    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),
    #[error("Invalid state envelope: {0}")]
    InvalidEnvelope(String),
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Invalid state: {0}")]
    InvalidState(#[from] StateError),
}

// =============================================================================
// CompactSize
// =============================================================================

/// Append a CompactSize integer
pub fn put_var_int(buf: &mut impl BufMut, n: u64) {
    match n {
        0..=0xfc => buf.put_u8(n as u8),
        0xfd..=0xffff => {
            buf.put_u8(0xfd);
            buf.put_u16_le(n as u16);
        }
        0x1_0000..=0xffff_ffff => {
            buf.put_u8(0xfe);
            buf.put_u32_le(n as u32);
        }
        _ => {
            buf.put_u8(0xff);
            buf.put_u64_le(n);
        }
    }
}

/// Read a CompactSize integer, rejecting non-minimal forms
pub fn get_var_int(buf: &mut impl Buf) -> Result<u64, CodecError> {
    ensure(buf.remaining(), 1)?;
    let n = match buf.get_u8() {
        0xfd => {
            ensure(buf.remaining(), 2)?;
            let n = u64::from(buf.get_u16_le());
            if n < 0xfd {
                return Err(CodecError::NonMinimalVarInt);
            }
            n
        }
        0xfe => {
            ensure(buf.remaining(), 4)?;
            let n = u64::from(buf.get_u32_le());
            if n <= 0xffff {
                return Err(CodecError::NonMinimalVarInt);
            }
            n
        }
        0xff => {
            ensure(buf.remaining(), 8)?;
            let n = buf.get_u64_le();
            if n <= 0xffff_ffff {
                return Err(CodecError::NonMinimalVarInt);
            }
            n
        }
        small => u64::from(small),
    };
    Ok(n)
}

/// Append a length-prefixed byte string
pub fn put_var_bytes(buf: &mut impl BufMut, data: &[u8]) {
    put_var_int(buf, data.len() as u64);
    buf.put_slice(data);
}

/// Read a length-prefixed byte string
pub fn get_var_bytes(buf: &mut impl Buf) -> Result<Vec<u8>, CodecError> {
    let len = get_var_int(buf)?;
    let len = usize::try_from(len).map_err(|_| CodecError::LengthOverflow(len))?;
    get_bytes(buf, len)
}

/// Read exactly `len` raw bytes
pub fn get_bytes(buf: &mut impl Buf, len: usize) -> Result<Vec<u8>, CodecError> {
    ensure(buf.remaining(), len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

pub(crate) fn ensure(available: usize, needed: usize) -> Result<(), CodecError> {
    if available < needed {
        return Err(CodecError::Truncated { needed, available });
    }
    Ok(())
}

// =============================================================================
// Transaction Output
// =============================================================================

/// A transaction output: an amount locked by a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in the ledger's base unit
    pub value: u64,
    /// Locking script
    #[serde(with = "hex_bytes")]
    pub script: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: u64, script: Vec<u8>) -> Self {
        Self { value, script }
    }

    /// Pay-to-public-key-hash output
    pub fn p2pkh(pubkey_hash: &[u8; 20], value: u64) -> Self {
        Self::new(value, p2pkh_script(pubkey_hash))
    }

    /// Append the wire form of this output
    pub fn write_to(&self, buf: &mut impl BufMut) {
        buf.put_u64_le(self.value);
        put_var_bytes(buf, &self.script);
    }

    /// Wire form of this output
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9 + self.script.len());
        self.write_to(&mut buf);
        buf
    }

    /// Read one output from the front of `buf`
    pub fn read_from(buf: &mut impl Buf) -> Result<Self, CodecError> {
        ensure(buf.remaining(), 8)?;
        let value = buf.get_u64_le();
        let script = get_var_bytes(buf)?;
        Ok(Self { value, script })
    }

    /// Decode exactly one output, rejecting trailing bytes
    pub fn from_bytes(mut data: &[u8]) -> Result<Self, CodecError> {
        let output = Self::read_from(&mut data)?;
        if !data.is_empty() {
            return Err(CodecError::TrailingBytes(data.len()));
        }
        Ok(output)
    }
}

/// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, 0x14]);
    script.extend_from_slice(pubkey_hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// Split a concatenation of serialized outputs
pub fn parse_outputs(mut data: &[u8]) -> Result<Vec<TxOutput>, CodecError> {
    let mut outputs = Vec::new();
    while !data.is_empty() {
        outputs.push(TxOutput::read_from(&mut data)?);
    }
    Ok(outputs)
}

// =============================================================================
// Output Set
// =============================================================================

/// The ordered outputs a transition must produce
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSet {
    pub outputs: Vec<TxOutput>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, output: TxOutput) {
        self.outputs.push(output);
    }

    pub fn extend<'a>(&mut self, outputs: impl IntoIterator<Item = &'a TxOutput>) {
        self.outputs.extend(outputs.into_iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Concatenated wire form of every output
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for output in &self.outputs {
            output.write_to(&mut buf);
        }
        buf
    }

    /// Double SHA-256 over the serialized outputs
    pub fn commitment(&self) -> [u8; 32] {
        double_sha256(&self.serialize())
    }
}

/// Serde adapter rendering byte vectors as hex strings
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for fixed 32-byte hashes as hex strings
pub mod hex_hash {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32-byte hex hash"))
    }
}
