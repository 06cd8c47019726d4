//! Role transfer and escrow
//!
//! Beneficiary and issuer share one code path, parameterised by [`Role`].
//! A holder may hand the role over directly, or list it together with a
//! payout obligation; anyone may then buy the listed role by creating that
//! payout. The payout destination is fixed at listing time, so a buyer can
//! only pay the agreed price, never redirect it.

use crate::contract::config::EmptyListingPolicy;
use crate::contract::error::ContractError;
use crate::core::{ContractState, ExecutionContext, Identity, Role, TxOutput};
use crate::crypto::{public_key_from_hex, verify_digest};
use secp256k1::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A holder's signature over the transaction sighash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSignature {
    #[serde(with = "hex_public_key")]
    pub public_key: PublicKey,
    /// Compact 64-byte ECDSA signature
    #[serde(with = "crate::core::output::hex_bytes")]
    pub signature: Vec<u8>,
}

impl RoleSignature {
    pub fn new(public_key: PublicKey, signature: Vec<u8>) -> Self {
        Self {
            public_key,
            signature,
        }
    }
}

/// Check that `signature` comes from `holder` over the context sighash
pub fn authorize(
    holder: &Identity,
    signature: &RoleSignature,
    ctx: &ExecutionContext,
) -> Result<(), ContractError> {
    if Identity::from_public_key(&signature.public_key) != *holder {
        return Err(ContractError::Unauthorized(
            "public key does not hash to the role holder".to_string(),
        ));
    }

    match verify_digest(&signature.public_key, &ctx.sighash, &signature.signature) {
        Ok(true) => Ok(()),
        Ok(false) => Err(ContractError::Unauthorized("signature check failed".to_string())),
        Err(e) => Err(ContractError::Unauthorized(e.to_string())),
    }
}

/// Transfer, listing and purchase of one role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTransferEscrow {
    role: Role,
}

impl RoleTransferEscrow {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Hand the role to `new_holder`; a pending listing stays in place
    pub fn transfer(
        &self,
        state: &ContractState,
        signature: &RoleSignature,
        new_holder: Identity,
        ctx: &ExecutionContext,
    ) -> Result<ContractState, ContractError> {
        authorize(&state.holder(self.role), signature, ctx)?;

        log::info!(
            "{} transferred: {} -> {}",
            self.role,
            state.holder(self.role),
            new_holder
        );

        let pending = state.pending_payout(self.role).cloned();
        Ok(state.with_role(self.role, new_holder, pending))
    }

    /// Set holder and listing together
    ///
    /// With a payout, the role becomes purchasable by anyone who creates
    /// that exact output. Without one, any pending listing is withdrawn.
    pub fn update(
        &self,
        state: &ContractState,
        signature: &RoleSignature,
        new_holder: Identity,
        payout: Option<TxOutput>,
        ctx: &ExecutionContext,
    ) -> Result<ContractState, ContractError> {
        authorize(&state.holder(self.role), signature, ctx)?;

        log::info!(
            "{} updated: {} -> {}{}",
            self.role,
            state.holder(self.role),
            new_holder,
            if payout.is_some() { " (listed)" } else { "" }
        );

        Ok(state.with_role(self.role, new_holder, payout))
    }

    /// Buy the listed role, returning the successor and the payout to create
    pub fn purchase(
        &self,
        state: &ContractState,
        new_holder: Identity,
        policy: EmptyListingPolicy,
    ) -> Result<(ContractState, Option<TxOutput>), ContractError> {
        let payout = state.pending_payout(self.role).cloned();

        if payout.is_none() && policy == EmptyListingPolicy::Reject {
            return Err(ContractError::NoListing(self.role));
        }

        log::info!(
            "{} purchased: {} -> {}",
            self.role,
            state.holder(self.role),
            new_holder
        );

        Ok((state.with_role(self.role, new_holder, None), payout))
    }
}

mod hex_public_key {
    use super::*;

    pub fn serialize<S: Serializer>(key: &PublicKey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(key.serialize()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PublicKey, D::Error> {
        let s = String::deserialize(deserializer)?;
        public_key_from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::header::fixtures::{header, H577267};
    use crate::core::Deployment;
    use crate::crypto::KeyPair;

    const SIGHASH: [u8; 32] = [0x5a; 32];

    fn state(beneficiary: &KeyPair, issuer: &KeyPair) -> ContractState {
        ContractState::deploy(Deployment {
            beneficiary: Identity::from_public_key(&beneficiary.public_key),
            issuer: Identity::from_public_key(&issuer.public_key),
            locked_value: 100,
            prev_header: header(H577267),
            prev_height: 577_267,
            target_bits: 0x1a35_0b34,
            required_count: 1,
            expiration_height: 577_277,
        })
        .unwrap()
    }

    fn sign(key: &KeyPair) -> RoleSignature {
        RoleSignature::new(key.public_key, key.sign(&SIGHASH))
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new([0u8; 32]).with_sighash(SIGHASH)
    }

    #[test]
    fn test_transfer_by_holder() {
        let (ben, iss, next) = (KeyPair::generate(), KeyPair::generate(), KeyPair::generate());
        let state = state(&ben, &iss);
        let next_id = Identity::from_public_key(&next.public_key);

        let escrow = RoleTransferEscrow::new(Role::Beneficiary);
        let successor = escrow.transfer(&state, &sign(&ben), next_id, &ctx()).unwrap();

        assert_eq!(successor.beneficiary, next_id);
        assert_eq!(successor.issuer, state.issuer);
        assert_eq!(successor.remaining_count, state.remaining_count);
    }

    #[test]
    fn test_transfer_rejects_other_key() {
        let (ben, iss) = (KeyPair::generate(), KeyPair::generate());
        let state = state(&ben, &iss);

        let escrow = RoleTransferEscrow::new(Role::Issuer);
        let result = escrow.transfer(&state, &sign(&ben), Identity::default(), &ctx());
        assert!(matches!(result, Err(ContractError::Unauthorized(_))));
    }

    #[test]
    fn test_transfer_rejects_signature_over_other_sighash() {
        let (ben, iss) = (KeyPair::generate(), KeyPair::generate());
        let state = state(&ben, &iss);
        let forged = RoleSignature::new(iss.public_key, iss.sign(&[0x00; 32]));

        let escrow = RoleTransferEscrow::new(Role::Issuer);
        let result = escrow.transfer(&state, &forged, Identity::default(), &ctx());
        assert!(matches!(result, Err(ContractError::Unauthorized(_))));
    }

    #[test]
    fn test_transfer_keeps_listing() {
        let (ben, iss) = (KeyPair::generate(), KeyPair::generate());
        let state = state(&ben, &iss);
        let escrow = RoleTransferEscrow::new(Role::Beneficiary);
        let payout = TxOutput::p2pkh(&[0x42; 20], 1000);

        let listed = escrow
            .update(&state, &sign(&ben), state.beneficiary, Some(payout.clone()), &ctx())
            .unwrap();
        assert!(listed.pending_beneficiary_payout.is_some());

        let moved = escrow
            .transfer(&listed, &sign(&ben), Identity::new([0x01; 20]), &ctx())
            .unwrap();
        assert_eq!(moved.beneficiary, Identity::new([0x01; 20]));
        assert_eq!(moved.pending_beneficiary_payout, Some(payout));
    }

    #[test]
    fn test_update_without_payout_withdraws_listing() {
        let (ben, iss) = (KeyPair::generate(), KeyPair::generate());
        let state = state(&ben, &iss);
        let escrow = RoleTransferEscrow::new(Role::Beneficiary);

        let listed = escrow
            .update(&state, &sign(&ben), state.beneficiary, Some(TxOutput::p2pkh(&[0x42; 20], 1000)), &ctx())
            .unwrap();
        let withdrawn = escrow
            .update(&listed, &sign(&ben), state.beneficiary, None, &ctx())
            .unwrap();
        assert_eq!(withdrawn.pending_beneficiary_payout, None);
        assert_eq!(withdrawn.beneficiary, state.beneficiary);
    }

    #[test]
    fn test_list_then_purchase() {
        let (ben, iss, buyer) = (KeyPair::generate(), KeyPair::generate(), KeyPair::generate());
        let state = state(&ben, &iss);
        let buyer_id = Identity::from_public_key(&buyer.public_key);
        let payout = TxOutput::p2pkh(Identity::from_public_key(&iss.public_key).as_bytes(), 1000);

        let escrow = RoleTransferEscrow::new(Role::Issuer);
        let listed = escrow
            .update(&state, &sign(&iss), state.issuer, Some(payout.clone()), &ctx())
            .unwrap();
        assert_eq!(listed.issuer, state.issuer);
        assert_eq!(listed.pending_issuer_payout, Some(payout.clone()));

        let (bought, owed) = escrow
            .purchase(&listed, buyer_id, EmptyListingPolicy::Reject)
            .unwrap();
        assert_eq!(bought.issuer, buyer_id);
        assert_eq!(bought.pending_issuer_payout, None);
        assert_eq!(owed, Some(payout));

        // The listing is consumed
        assert_eq!(
            escrow.purchase(&bought, buyer_id, EmptyListingPolicy::Reject),
            Err(ContractError::NoListing(Role::Issuer))
        );
    }

    #[test]
    fn test_free_claim_policy() {
        let (ben, iss) = (KeyPair::generate(), KeyPair::generate());
        let escrow = RoleTransferEscrow::new(Role::Beneficiary);
        let claimer = Identity::new([0x0c; 20]);

        let (claimed, owed) = escrow
            .purchase(&state(&ben, &iss), claimer, EmptyListingPolicy::AllowFreeClaim)
            .unwrap();
        assert_eq!(claimed.beneficiary, claimer);
        assert_eq!(owed, None);
    }

    #[test]
    fn test_signature_json() {
        let key = KeyPair::generate();
        let sig = sign(&key);
        let json = serde_json::to_string(&sig).unwrap();
        let back: RoleSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
