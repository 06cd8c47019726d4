//! Contract errors
//!
//! Every failure aborts the whole operation; no partial state is produced.

use crate::core::{CodecError, Role, StateError};
use thiserror::Error;

/// Why a contract operation was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Header {index} does not extend the previous header")]
    InvalidChainLinkage { index: usize },
    #[error("Outputs do not match the transaction's output commitment")]
    InvalidOutputCommitment,
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Refund not available: {0}")]
    RefundNotAvailable(String),
    #[error("No complete header to process")]
    NoProgress,
    #[error("Tip height overflow")]
    HeightOverflow,
    #[error("No pending listing for the {0} role")]
    NoListing(Role),
    #[error("Invalid state: {0}")]
    InvalidState(#[from] StateError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}
