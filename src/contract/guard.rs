//! Output commitment enforcement
//!
//! Each transition kind fixes the exact output sequence its spending
//! transaction must create. The guard builds that sequence and compares
//! its double SHA-256 with the commitment the ledger reports.

use crate::contract::error::ContractError;
use crate::core::{ContractState, ExecutionContext, Identity, OutputSet, TxOutput};
use serde::{Deserialize, Serialize};

/// The shape of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Headers consumed, requirement not yet met
    Progress,
    /// Requirement met, locked value paid to the beneficiary
    Fulfilment,
    /// Role holder changed or listed by its current holder
    RoleUpdate,
    /// Listed role bought by a new holder
    RolePurchase,
    /// Issuer reclaimed the funds after expiry
    Refund,
}

impl TransitionKind {
    /// No successor instance exists after this transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransitionKind::Fulfilment | TransitionKind::Refund)
    }
}

/// Caller-chosen outputs that follow the contract-mandated ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputTail {
    /// Arbitrary outputs placed after the mandated outputs
    pub trailing_outputs: Vec<TxOutput>,
    /// Change output closing the transaction
    pub change: Option<TxOutput>,
}

impl OutputTail {
    pub fn new(trailing_outputs: Vec<TxOutput>, change: Option<TxOutput>) -> Self {
        Self {
            trailing_outputs,
            change,
        }
    }

    fn append_to(&self, outputs: &mut OutputSet) {
        outputs.extend(&self.trailing_outputs);
        if let Some(change) = &self.change {
            outputs.push(change.clone());
        }
    }
}

/// Builds and checks the mandated output sequences
#[derive(Debug, Clone, Copy)]
pub struct StateTransitionGuard<'a> {
    locking_code: &'a [u8],
}

impl<'a> StateTransitionGuard<'a> {
    pub fn new(locking_code: &'a [u8]) -> Self {
        Self { locking_code }
    }

    /// continuation(successor), trailing, change
    pub fn continuation(&self, successor: &ContractState, tail: &OutputTail) -> OutputSet {
        let mut outputs = OutputSet::new();
        outputs.push(successor.continuation_output(self.locking_code));
        tail.append_to(&mut outputs);
        outputs
    }

    /// payout(beneficiary, locked value), trailing, change
    pub fn fulfilment(&self, beneficiary: &Identity, locked_value: u64, tail: &OutputTail) -> OutputSet {
        let mut outputs = OutputSet::new();
        outputs.push(TxOutput::p2pkh(beneficiary.as_bytes(), locked_value));
        tail.append_to(&mut outputs);
        outputs
    }

    /// continuation(successor), stored payout, trailing, change
    pub fn purchase(
        &self,
        successor: &ContractState,
        payout: Option<&TxOutput>,
        tail: &OutputTail,
    ) -> OutputSet {
        let mut outputs = OutputSet::new();
        outputs.push(successor.continuation_output(self.locking_code));
        if let Some(payout) = payout {
            outputs.push(payout.clone());
        }
        tail.append_to(&mut outputs);
        outputs
    }

    /// Compare the outputs with the ledger's commitment
    pub fn verify(&self, outputs: &OutputSet, ctx: &ExecutionContext) -> Result<(), ContractError> {
        let commitment = outputs.commitment();
        if commitment != ctx.outputs_commitment {
            log::warn!(
                "Output commitment mismatch: built {}, ledger reports {}",
                hex::encode(commitment),
                hex::encode(ctx.outputs_commitment)
            );
            return Err(ContractError::InvalidOutputCommitment);
        }
        Ok(())
    }
}
