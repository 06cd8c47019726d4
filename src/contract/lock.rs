//! The difficulty lock operation surface
//!
//! Every operation is a pure function of the prior state, its payload and
//! the ledger context. It either yields the mandated outputs and successor
//! state, or fails without effect.

use crate::contract::config::{LockConfig, SubmissionPolicy};
use crate::contract::error::ContractError;
use crate::contract::guard::{OutputTail, StateTransitionGuard, TransitionKind};
use crate::contract::refund::ExpiryRefund;
use crate::contract::role::{authorize, RoleSignature, RoleTransferEscrow};
use crate::contract::verifier::{ChainProgress, HeaderChainVerifier};
use crate::core::output::hex_bytes;
use crate::core::{ContractState, ExecutionContext, Identity, OutputSet, Role, TxOutput, BLOCK_HEADER_SIZE};
use serde::{Deserialize, Serialize};

// =============================================================================
// Operations
// =============================================================================

/// A proposed state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Submit concatenated 80-byte headers extending the tracked tip
    RecordBlocks {
        #[serde(with = "hex_bytes")]
        headers: Vec<u8>,
        #[serde(default)]
        tail: OutputTail,
        /// Required only under a beneficiary-gated submission policy
        #[serde(default)]
        signature: Option<RoleSignature>,
    },
    /// Issuer reclaims the funds after expiry
    Refund { signature: RoleSignature },
    /// Holder hands the role over
    Transfer {
        role: Role,
        signature: RoleSignature,
        new_holder: Identity,
        #[serde(default)]
        tail: OutputTail,
    },
    /// Holder sets the role holder and its listing; no payout withdraws it
    Update {
        role: Role,
        signature: RoleSignature,
        new_holder: Identity,
        #[serde(default)]
        payout: Option<TxOutput>,
        #[serde(default)]
        tail: OutputTail,
    },
    /// Anyone buys a listed role by creating its payout
    Purchase {
        role: Role,
        new_holder: Identity,
        #[serde(default)]
        tail: OutputTail,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::RecordBlocks { .. } => "record_blocks",
            Operation::Refund { .. } => "refund",
            Operation::Transfer { .. } => "transfer",
            Operation::Update { .. } => "update",
            Operation::Purchase { .. } => "purchase",
        }
    }
}

/// An accepted state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub kind: TransitionKind,
    /// Mandated outputs; `None` when the output shape is unconstrained
    pub outputs: Option<OutputSet>,
    /// Next instance; `None` once the contract is consumed
    pub successor: Option<ContractState>,
}

// =============================================================================
// Difficulty Lock
// =============================================================================

/// Evaluates operations against a contract instance
#[derive(Debug, Clone, Default)]
pub struct DifficultyLock {
    config: LockConfig,
}

impl DifficultyLock {
    pub fn new(config: LockConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    fn guard(&self) -> StateTransitionGuard<'_> {
        StateTransitionGuard::new(&self.config.locking_code)
    }

    /// Apply an operation, enforcing the output commitment
    pub fn apply(
        &self,
        state: &ContractState,
        op: &Operation,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        let transition = self.prepare(state, op, ctx)?;
        if let Some(outputs) = &transition.outputs {
            self.guard().verify(outputs, ctx)?;
        }
        log::info!("Accepted {} ({:?})", op.name(), transition.kind);
        Ok(transition)
    }

    /// Run every check except the commitment and build the transition
    ///
    /// States that fail [`ContractState::validate`] are rejected before the
    /// operation is looked at.
    pub fn prepare(
        &self,
        state: &ContractState,
        op: &Operation,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        state.validate()?;

        match op {
            Operation::RecordBlocks {
                headers,
                tail,
                signature,
            } => self.prepare_record_blocks(state, headers, tail, signature.as_ref(), ctx),
            Operation::Refund { signature } => {
                ExpiryRefund::check(state, signature, ctx)?;
                Ok(Transition {
                    kind: TransitionKind::Refund,
                    outputs: None,
                    successor: None,
                })
            }
            Operation::Transfer {
                role,
                signature,
                new_holder,
                tail,
            } => {
                let successor =
                    RoleTransferEscrow::new(*role).transfer(state, signature, *new_holder, ctx)?;
                Ok(self.role_update(successor, tail))
            }
            Operation::Update {
                role,
                signature,
                new_holder,
                payout,
                tail,
            } => {
                let successor = RoleTransferEscrow::new(*role).update(
                    state,
                    signature,
                    *new_holder,
                    payout.clone(),
                    ctx,
                )?;
                Ok(self.role_update(successor, tail))
            }
            Operation::Purchase {
                role,
                new_holder,
                tail,
            } => {
                let (successor, payout) = RoleTransferEscrow::new(*role).purchase(
                    state,
                    *new_holder,
                    self.config.empty_listing_policy,
                )?;
                let outputs = self.guard().purchase(&successor, payout.as_ref(), tail);
                Ok(Transition {
                    kind: TransitionKind::RolePurchase,
                    outputs: Some(outputs),
                    successor: Some(successor),
                })
            }
        }
    }

    fn prepare_record_blocks(
        &self,
        state: &ContractState,
        headers: &[u8],
        tail: &OutputTail,
        signature: Option<&RoleSignature>,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        if self.config.submission_policy == SubmissionPolicy::BeneficiaryGated {
            let signature = signature.ok_or_else(|| {
                ContractError::Unauthorized("header submission requires the beneficiary".to_string())
            })?;
            authorize(&state.beneficiary, signature, ctx)?;
        }

        if headers.len() < BLOCK_HEADER_SIZE {
            return Err(ContractError::NoProgress);
        }

        let verifier = HeaderChainVerifier::new(self.config.max_headers, state.target_difficulty);
        let progress = verifier.process_headers(&ChainProgress::from_state(state), headers)?;

        if progress.fulfilled {
            log::info!(
                "Difficulty lock fulfilled; releasing {} to {}",
                state.locked_value,
                state.beneficiary.to_address()
            );
            let outputs = self
                .guard()
                .fulfilment(&state.beneficiary, state.locked_value, tail);
            return Ok(Transition {
                kind: TransitionKind::Fulfilment,
                outputs: Some(outputs),
                successor: None,
            });
        }

        let successor = ContractState {
            prev_header: progress.tip,
            prev_height: progress.height,
            remaining_count: progress.remaining,
            ..state.clone()
        };
        log::info!(
            "Recorded blocks up to height {}; {} qualifying blocks remaining",
            successor.prev_height,
            successor.remaining_count
        );

        let outputs = self.guard().continuation(&successor, tail);
        Ok(Transition {
            kind: TransitionKind::Progress,
            outputs: Some(outputs),
            successor: Some(successor),
        })
    }

    fn role_update(&self, successor: ContractState, tail: &OutputTail) -> Transition {
        let outputs = self.guard().continuation(&successor, tail);
        Transition {
            kind: TransitionKind::RoleUpdate,
            outputs: Some(outputs),
            successor: Some(successor),
        }
    }

    // =========================================================================
    // Named operations
    // =========================================================================

    pub fn record_blocks(
        &self,
        state: &ContractState,
        headers: Vec<u8>,
        tail: OutputTail,
        signature: Option<RoleSignature>,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        let op = Operation::RecordBlocks {
            headers,
            tail,
            signature,
        };
        self.apply(state, &op, ctx)
    }

    pub fn refund(
        &self,
        state: &ContractState,
        signature: RoleSignature,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        self.apply(state, &Operation::Refund { signature }, ctx)
    }

    pub fn transfer_beneficiary(
        &self,
        state: &ContractState,
        signature: RoleSignature,
        new_holder: Identity,
        tail: OutputTail,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        self.transfer(Role::Beneficiary, state, signature, new_holder, tail, ctx)
    }

    pub fn transfer_issuer(
        &self,
        state: &ContractState,
        signature: RoleSignature,
        new_holder: Identity,
        tail: OutputTail,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        self.transfer(Role::Issuer, state, signature, new_holder, tail, ctx)
    }

    pub fn update_beneficiary(
        &self,
        state: &ContractState,
        signature: RoleSignature,
        new_holder: Identity,
        payout: Option<TxOutput>,
        tail: OutputTail,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        self.update(Role::Beneficiary, state, signature, new_holder, payout, tail, ctx)
    }

    pub fn update_issuer(
        &self,
        state: &ContractState,
        signature: RoleSignature,
        new_holder: Identity,
        payout: Option<TxOutput>,
        tail: OutputTail,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        self.update(Role::Issuer, state, signature, new_holder, payout, tail, ctx)
    }

    pub fn purchase_beneficiary(
        &self,
        state: &ContractState,
        new_holder: Identity,
        tail: OutputTail,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        let op = Operation::Purchase {
            role: Role::Beneficiary,
            new_holder,
            tail,
        };
        self.apply(state, &op, ctx)
    }

    pub fn purchase_issuer(
        &self,
        state: &ContractState,
        new_holder: Identity,
        tail: OutputTail,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        let op = Operation::Purchase {
            role: Role::Issuer,
            new_holder,
            tail,
        };
        self.apply(state, &op, ctx)
    }

    fn transfer(
        &self,
        role: Role,
        state: &ContractState,
        signature: RoleSignature,
        new_holder: Identity,
        tail: OutputTail,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        let op = Operation::Transfer {
            role,
            signature,
            new_holder,
            tail,
        };
        self.apply(state, &op, ctx)
    }

    #[allow(clippy::too_many_arguments)]
    fn update(
        &self,
        role: Role,
        state: &ContractState,
        signature: RoleSignature,
        new_holder: Identity,
        payout: Option<TxOutput>,
        tail: OutputTail,
        ctx: &ExecutionContext,
    ) -> Result<Transition, ContractError> {
        let op = Operation::Update {
            role,
            signature,
            new_holder,
            payout,
            tail,
        };
        self.apply(state, &op, ctx)
    }
}
