//! Time-locked refund
//!
//! After the expiration height the issuer may reclaim the locked value.
//! The spending transaction must carry a height-based locktime that the
//! ledger actually enforces; the output shape is left to the issuer.

use crate::contract::error::ContractError;
use crate::contract::role::{authorize, RoleSignature};
use crate::core::{ContractState, ExecutionContext};

/// Refund precondition checks
pub struct ExpiryRefund;

impl ExpiryRefund {
    /// All four preconditions must hold at once
    pub fn check(
        state: &ContractState,
        signature: &RoleSignature,
        ctx: &ExecutionContext,
    ) -> Result<(), ContractError> {
        if !ctx.is_height_lock() {
            return Err(ContractError::RefundNotAvailable(
                "locktime must be a block height".to_string(),
            ));
        }
        if !ctx.time_lock_enabled() {
            return Err(ContractError::RefundNotAvailable(
                "input sequence disables the locktime".to_string(),
            ));
        }
        if u64::from(ctx.time_lock) < state.expiration_height {
            return Err(ContractError::RefundNotAvailable(format!(
                "expiration height {} not reached (locktime {})",
                state.expiration_height, ctx.time_lock
            )));
        }

        authorize(&state.issuer, signature, ctx)?;

        log::info!(
            "Refund of {} to issuer {} at locktime {}",
            state.locked_value,
            state.issuer,
            ctx.time_lock
        );
        Ok(())
    }
}
