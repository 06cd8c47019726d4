//! Difficulty Lock: a proof-of-work covenant over a UTXO ledger
//!
//! This crate escrows value in a contract output and releases it to a
//! beneficiary once enough sufficiently hard block headers, chained onto a
//! tracked tip, have been submitted. It features:
//! - Compact difficulty decoding into 256-bit targets
//! - Header chain verification with a fixed number of slots per call
//! - Output-commitment checks on every state transition
//! - Transferable and purchasable beneficiary and issuer roles
//! - Issuer refund after an expiration height
//! - JSON persistence with backups and a command-line driver
//!
//! # Example
//!
//! ```rust,no_run
//! use difficulty_lock::contract::{DifficultyLock, LockConfig, OutputTail};
//! use difficulty_lock::core::{BlockHeader, ContractState, Deployment, ExecutionContext, Identity};
//!
//! # fn run(tip: BlockHeader, next: BlockHeader) -> Result<(), Box<dyn std::error::Error>> {
//! let state = ContractState::deploy(Deployment {
//!     beneficiary: Identity::new([1u8; 20]),
//!     issuer: Identity::new([2u8; 20]),
//!     locked_value: 100_000,
//!     prev_header: tip,
//!     prev_height: 1_000_000,
//!     target_bits: 0x1b52_ccc0,
//!     required_count: 1,
//!     expiration_height: 1_000_100,
//! })?;
//!
//! let lock = DifficultyLock::new(LockConfig::default());
//! let ctx = ExecutionContext::new([0u8; 32]);
//! let plan = lock.prepare(&state, &difficulty_lock::contract::Operation::RecordBlocks {
//!     headers: next.as_bytes().to_vec(),
//!     tail: OutputTail::default(),
//!     signature: None,
//! }, &ctx)?;
//! println!("{:?}", plan.kind);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod contract;
pub mod core;
pub mod crypto;
pub mod storage;

// Re-export commonly used types
pub use contract::{
    ContractError, DifficultyLock, ExpiryRefund, HeaderChainVerifier, LockConfig, Operation,
    RoleTransferEscrow, StateTransitionGuard, Transition,
};
pub use core::{BlockHeader, ContractState, Deployment, ExecutionContext, Identity, OutputSet, Role, TxOutput};
pub use crypto::KeyPair;
pub use storage::{ContractRecord, StateStore};
