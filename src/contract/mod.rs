//! Difficulty lock contract
//!
//! Escrows value until a chain of proof-of-work headers, each at least as
//! hard as the target difficulty, has been submitted on top of a tracked
//! tip. Both roles can be transferred or sold, and the issuer may reclaim
//! the funds after the expiration height.
//!
//! # Example
//!
//! ```rust,no_run
//! use difficulty_lock::contract::{DifficultyLock, LockConfig, Operation, OutputTail};
//! use difficulty_lock::core::{ContractState, ExecutionContext};
//!
//! # fn run(state: ContractState, headers: Vec<u8>, ctx: ExecutionContext) {
//! let lock = DifficultyLock::new(LockConfig::default());
//! let op = Operation::RecordBlocks {
//!     headers,
//!     tail: OutputTail::default(),
//!     signature: None,
//! };
//! match lock.apply(&state, &op, &ctx) {
//!     Ok(transition) => println!("{:?}", transition.kind),
//!     Err(e) => eprintln!("rejected: {}", e),
//! }
//! # }
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod lock;
pub mod refund;
pub mod role;
pub mod verifier;

pub use config::{
    ConfigError, EmptyListingPolicy, LockConfig, SubmissionPolicy, DEFAULT_MAX_HEADERS, MAX_HEADER_CAP,
};
pub use error::ContractError;
pub use guard::{OutputTail, StateTransitionGuard, TransitionKind};
pub use lock::{DifficultyLock, Operation, Transition};
pub use refund::ExpiryRefund;
pub use role::{authorize, RoleSignature, RoleTransferEscrow};
pub use verifier::{ChainProgress, HeaderChainVerifier};
