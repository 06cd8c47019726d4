//! Core ledger types
//!
//! This module contains the wire-level building blocks:
//! - Compact difficulty decoding
//! - Raw 80-byte block headers
//! - Transaction outputs and output-set commitments
//! - The contract state and its continuation encoding
//! - The execution context supplied by the ledger

pub mod compact;
pub mod context;
pub mod header;
pub mod output;
pub mod state;

pub use compact::{decode_detailed as decode_compact_detailed, CompactTarget};
pub use context::{ExecutionContext, LOCKTIME_THRESHOLD, SEQUENCE_FINAL};
pub use header::{BlockHeader, BLOCK_HEADER_SIZE};
pub use output::{p2pkh_script, parse_outputs, CodecError, OutputSet, TxOutput};
pub use state::{ContractState, Deployment, Identity, Role, StateError, STATE_VERSION};
