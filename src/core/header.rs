//! Raw 80-byte block headers
//!
//! Layout (integers little-endian):
//! `version[0:4] prev_hash[4:36] merkle_root[36:68] timestamp[68:72] bits[72:76] nonce[76:80]`

use crate::core::compact;
use crate::crypto::double_sha256;
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Block header size in bytes (80 bytes like Bitcoin)
pub const BLOCK_HEADER_SIZE: usize = 80;

/// A block header kept in its exact wire form
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHeader([u8; BLOCK_HEADER_SIZE]);

impl BlockHeader {
    pub fn from_bytes(bytes: [u8; BLOCK_HEADER_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a header from a slice of exactly 80 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; BLOCK_HEADER_SIZE] = bytes.try_into().ok()?;
        Some(Self(raw))
    }

    pub fn from_hex(hex_str: &str) -> Option<Self> {
        Self::from_slice(&hex::decode(hex_str).ok()?)
    }

    /// Assemble a header from its fields
    pub fn from_parts(
        version: u32,
        prev_hash: [u8; 32],
        merkle_root: [u8; 32],
        timestamp: u32,
        bits: u32,
        nonce: u32,
    ) -> Self {
        let mut raw = [0u8; BLOCK_HEADER_SIZE];
        raw[0..4].copy_from_slice(&version.to_le_bytes());
        raw[4..36].copy_from_slice(&prev_hash);
        raw[36..68].copy_from_slice(&merkle_root);
        raw[68..72].copy_from_slice(&timestamp.to_le_bytes());
        raw[72..76].copy_from_slice(&bits.to_le_bytes());
        raw[76..80].copy_from_slice(&nonce.to_le_bytes());
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; BLOCK_HEADER_SIZE] {
        &self.0
    }

    pub fn version(&self) -> u32 {
        self.read_u32(0)
    }

    /// Digest of the previous header, in internal byte order
    pub fn prev_hash(&self) -> &[u8] {
        &self.0[4..36]
    }

    pub fn merkle_root(&self) -> &[u8] {
        &self.0[36..68]
    }

    pub fn timestamp(&self) -> u32 {
        self.read_u32(68)
    }

    /// Compact encoding of this header's own target
    pub fn bits(&self) -> u32 {
        self.read_u32(72)
    }

    pub fn nonce(&self) -> u32 {
        self.read_u32(76)
    }

    /// Double SHA-256 of the raw header
    pub fn hash(&self) -> [u8; 32] {
        double_sha256(&self.0)
    }

    /// Header hash in the conventional reversed display order
    pub fn hash_hex(&self) -> String {
        let mut hash = self.hash();
        hash.reverse();
        hex::encode(hash)
    }

    /// The header digest read as a little-endian unsigned integer
    pub fn work_value(&self) -> U256 {
        U256::from_little_endian(&self.hash())
    }

    /// Decoded target this header claims for itself
    pub fn target(&self) -> U256 {
        compact::decode(self.bits())
    }

    /// Whether this header extends `parent`
    pub fn extends(&self, parent: &BlockHeader) -> bool {
        self.prev_hash() == parent.hash()
    }

    fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.0[offset],
            self.0[offset + 1],
            self.0[offset + 2],
            self.0[offset + 3],
        ])
    }
}

impl fmt::Debug for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHeader")
            .field("hash", &self.hash_hex())
            .field("bits", &format_args!("{:#010x}", self.bits()))
            .finish()
    }
}

impl Serialize for BlockHeader {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for BlockHeader {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        Self::from_hex(&hex_str)
            .ok_or_else(|| serde::de::Error::custom("expected 80-byte hex block header"))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Real testnet headers shared by the contract tests.

    use super::BlockHeader;

    /// Testnet block 577267
    pub const H577267: &str = "070000206a69fce3949dd23becc8d9ab6839ea24f18066209f143a8a9322000000000000ef3f432052cd15b3e2b7c738740f480b9523d38c260da48a8fb7476ca911275f8b571956340b351a71b3c82d";

    /// Testnet block 577266, the parent of 577267
    pub const H577266: &str = "0300000034396f827db1fabda26ea0a1c66b74f1b72c092327a126a9462e0000000000000499350778884725469e0a4fd7a782f79b9e272ccaba9f21f10f7891f566960a38571956340b351a11f71ec9";

    /// Testnet blocks 1000000..=1000005, each extending the previous one
    pub const CHAIN_1M: [&str; 6] = [
        "000000201af2487466dc0437a1fc545740abd82c9d51b5a4bab9e5fea5082200000000000b209c935968affb31bd1288e66203a2b635b902a2352f7867b85201f6baaf09044d0758c0cc521bd1cf559f",
        "00000020148484cce68f27995e954763946f620601ebbeaf2fda3e9a258e4700000000004dc2535c8e64cfc021efc0a03df585c838e60741c75ccba1c6d59e3db03070cbfb4c0758c0cc521b71b6dead",
        "00000020f9283c273ac0134b4eec1e397fe0c5bb59b3a545e10c480be6321f00000000001720916f0a4385ebc4c74877dd2ef4ee059fa5f8b0f3736fe35e9bdbd37fd2d2264d0758c0cc521b64e4b5a4",
        "00000020ea9bf7b2a7a4d6f49981e05aadf5d4221e8cf26bb04b798a96f6000000000000018d9f9ad58a2bbd61535041045183c16e42f49a7b0c4b40ab6f781bc2abc93f184d0758c0cc521be700826e",
        "000000201a7e16123cae1358864eae1bcc1dbe443a1baf1963d4e6f128d315000000000056b4a4f743341c6e7da170892036effffa7f83851a5ffcec88585438c002e31c084d0758c0cc521b303178a1",
        "000000201d77cbef288470e2926358379564d675f15418df84dd8292f1990f0000000000686cc01a43cf102dcb749bd44b2694ca5169a124a64aa5b25a2c1827d9d50d29254d0758c0cc521b6281d04e",
    ];

    pub fn header(hex_str: &str) -> BlockHeader {
        BlockHeader::from_hex(hex_str).unwrap()
    }

    /// Concatenate raw headers into a submission blob
    pub fn blob(headers: &[BlockHeader]) -> Vec<u8> {
        headers.iter().flat_map(|h| h.as_bytes().to_vec()).collect()
    }

    /// Grind the nonce until the header meets its own target
    pub fn mine_child(parent: &BlockHeader, bits: u32, timestamp: u32) -> BlockHeader {
        let mut nonce = 0u32;
        loop {
            let candidate =
                BlockHeader::from_parts(0x2000_0000, parent.hash(), [0u8; 32], timestamp, bits, nonce);
            if candidate.work_value() <= candidate.target() {
                return candidate;
            }
            nonce += 1;
        }
    }

    /// Build `count` mined headers on top of `tip`
    pub fn mine_chain(tip: &BlockHeader, bits: u32, count: usize) -> Vec<BlockHeader> {
        let mut headers = Vec::with_capacity(count);
        let mut parent = *tip;
        for i in 0..count {
            let child = mine_child(&parent, bits, 1_700_000_000 + i as u32);
            headers.push(child);
            parent = child;
        }
        headers
    }
}
