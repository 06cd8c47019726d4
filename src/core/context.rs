//! Read-only context supplied by the ledger for each transition

use crate::core::output::hex_hash;
use serde::{Deserialize, Serialize};

/// Locktime threshold: values below are block heights, above are timestamps
/// (500 million, same as Bitcoin)
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Sequence number that disables locktime
pub const SEQUENCE_FINAL: u32 = 0xFFFF_FFFF;

/// What the spending transaction exposes to the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Transaction locktime
    pub time_lock: u32,
    /// Sequence number of the contract input
    pub sequence: u32,
    /// Double SHA-256 of the transaction's serialized outputs
    #[serde(with = "hex_hash")]
    pub outputs_commitment: [u8; 32],
    /// Signature hash role holders sign over
    #[serde(with = "hex_hash", default)]
    pub sighash: [u8; 32],
}

impl ExecutionContext {
    pub fn new(outputs_commitment: [u8; 32]) -> Self {
        Self {
            time_lock: 0,
            sequence: SEQUENCE_FINAL,
            outputs_commitment,
            sighash: [0u8; 32],
        }
    }

    pub fn with_time_lock(mut self, time_lock: u32, sequence: u32) -> Self {
        self.time_lock = time_lock;
        self.sequence = sequence;
        self
    }

    pub fn with_sighash(mut self, sighash: [u8; 32]) -> Self {
        self.sighash = sighash;
        self
    }

    /// Locktime is interpreted as a block height
    pub fn is_height_lock(&self) -> bool {
        self.time_lock < LOCKTIME_THRESHOLD
    }

    /// The input's sequence leaves locktime enforcement on
    pub fn time_lock_enabled(&self) -> bool {
        self.sequence < SEQUENCE_FINAL
    }
}
