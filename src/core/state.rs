//! Contract state carried between transitions
//!
//! Every non-terminal transition re-encodes the full state into its
//! continuation output. The encoding is positional and must round-trip
//! byte-for-byte, so decoding accepts nothing but the exact layout.

use crate::core::context::LOCKTIME_THRESHOLD;
use crate::core::header::{BlockHeader, BLOCK_HEADER_SIZE};
use crate::core::compact;
use crate::core::output::{
    ensure, get_bytes, get_var_bytes, put_var_bytes, CodecError, TxOutput, OP_RETURN,
};
use crate::crypto::{hash_to_address, public_key_hash};
use bytes::{Buf, BufMut};
use primitive_types::U256;
use secp256k1::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Version byte closing every continuation script
pub const STATE_VERSION: u8 = 0x00;

/// Envelope bytes after the state: 4-byte length plus version
const ENVELOPE_TRAILER: usize = 5;

/// Deployment parameter errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("At least one qualifying block must be required")]
    NoBlocksRequired,
    #[error("Expiration {0} is not a block height (must be < {})", LOCKTIME_THRESHOLD)]
    ExpirationNotHeight(u64),
    #[error("Tip height {0} is not a block height (must be < {})", LOCKTIME_THRESHOLD)]
    TipHeightOutOfRange(u64),
}

// =============================================================================
// Roles
// =============================================================================

/// The two transferable roles of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Receives the locked value on fulfilment
    Beneficiary,
    /// Controls the refund path
    Issuer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Beneficiary => write!(f, "beneficiary"),
            Role::Issuer => write!(f, "issuer"),
        }
    }
}

// =============================================================================
// Identity
// =============================================================================

/// A role holder: HASH160 of a compressed secp256k1 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Identity([u8; 20]);

impl Identity {
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(public_key_hash(public_key))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(hex_str).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        let hash: [u8; 20] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidHex("identity must be 20 bytes".to_string()))?;
        Ok(Self(hash))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Base58Check rendering for display
    pub fn to_address(&self) -> String {
        hash_to_address(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", hex::encode(self.0))
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        Self::from_hex(&hex_str).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Deployment
// =============================================================================

/// Parameters supplied when a contract instance is first created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub beneficiary: Identity,
    pub issuer: Identity,
    pub locked_value: u64,
    /// Chain tip the first submitted header must extend
    pub prev_header: BlockHeader,
    pub prev_height: u64,
    /// Compact encoding of the easiest acceptable target
    pub target_bits: u32,
    /// Qualifying blocks required for release
    pub required_count: u64,
    pub expiration_height: u64,
}

// =============================================================================
// Contract State
// =============================================================================

/// The persistent record carried from one transition to the next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub beneficiary: Identity,
    pub issuer: Identity,
    /// Escrowed amount, constant for the lifetime of the contract
    pub locked_value: u64,
    /// Last accepted header
    pub prev_header: BlockHeader,
    pub prev_height: u64,
    /// Easiest target a qualifying block may claim
    pub target_difficulty: U256,
    /// Qualifying blocks still required
    pub remaining_count: u64,
    pub expiration_height: u64,
    #[serde(default)]
    pub pending_beneficiary_payout: Option<TxOutput>,
    #[serde(default)]
    pub pending_issuer_payout: Option<TxOutput>,
}

impl ContractState {
    /// Create a fresh instance with no pending listings
    pub fn deploy(params: Deployment) -> Result<Self, StateError> {
        let state = Self {
            beneficiary: params.beneficiary,
            issuer: params.issuer,
            locked_value: params.locked_value,
            prev_header: params.prev_header,
            prev_height: params.prev_height,
            target_difficulty: compact::decode(params.target_bits),
            remaining_count: params.required_count,
            expiration_height: params.expiration_height,
            pending_beneficiary_payout: None,
            pending_issuer_payout: None,
        };
        state.validate()?;
        Ok(state)
    }

    /// Check the invariants every live instance must satisfy
    ///
    /// A live instance still requires at least one qualifying block, and
    /// both heights stay below the locktime threshold.
    pub fn validate(&self) -> Result<(), StateError> {
        if self.remaining_count == 0 {
            return Err(StateError::NoBlocksRequired);
        }
        if self.prev_height >= u64::from(LOCKTIME_THRESHOLD) {
            return Err(StateError::TipHeightOutOfRange(self.prev_height));
        }
        if self.expiration_height >= u64::from(LOCKTIME_THRESHOLD) {
            return Err(StateError::ExpirationNotHeight(self.expiration_height));
        }
        Ok(())
    }

    /// Positional binary encoding of every field
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.put_slice(self.beneficiary.as_bytes());
        buf.put_slice(self.issuer.as_bytes());
        buf.put_u64_le(self.locked_value);
        buf.put_slice(self.prev_header.as_bytes());
        buf.put_u64_le(self.prev_height);

        let mut target = [0u8; 32];
        self.target_difficulty.to_little_endian(&mut target);
        buf.put_slice(&target);

        buf.put_u64_le(self.remaining_count);
        buf.put_u64_le(self.expiration_height);
        put_pending(&mut buf, self.pending_beneficiary_payout.as_ref());
        put_pending(&mut buf, self.pending_issuer_payout.as_ref());
        buf
    }

    /// Decode the positional encoding, rejecting trailing bytes and states
    /// that fail [`ContractState::validate`]
    pub fn decode(mut data: &[u8]) -> Result<Self, CodecError> {
        let buf = &mut data;

        let beneficiary = get_identity(buf)?;
        let issuer = get_identity(buf)?;
        ensure(buf.remaining(), 8)?;
        let locked_value = buf.get_u64_le();

        let header_bytes = get_bytes(buf, BLOCK_HEADER_SIZE)?;
        let prev_header = BlockHeader::from_slice(&header_bytes).ok_or(CodecError::Truncated {
            needed: BLOCK_HEADER_SIZE,
            available: header_bytes.len(),
        })?;

        ensure(buf.remaining(), 8 + 32 + 16)?;
        let prev_height = buf.get_u64_le();
        let target_difficulty = U256::from_little_endian(&get_bytes(buf, 32)?);
        let remaining_count = buf.get_u64_le();
        let expiration_height = buf.get_u64_le();

        let pending_beneficiary_payout = get_pending(buf)?;
        let pending_issuer_payout = get_pending(buf)?;

        if buf.has_remaining() {
            return Err(CodecError::TrailingBytes(buf.remaining()));
        }

        let state = Self {
            beneficiary,
            issuer,
            locked_value,
            prev_header,
            prev_height,
            target_difficulty,
            remaining_count,
            expiration_height,
            pending_beneficiary_payout,
            pending_issuer_payout,
        };
        state.validate()?;
        Ok(state)
    }

    /// `locking_code || OP_RETURN || state || u32 LE len(state) || version`
    pub fn continuation_script(&self, locking_code: &[u8]) -> Vec<u8> {
        let state = self.encode();
        let mut script = Vec::with_capacity(locking_code.len() + 1 + state.len() + ENVELOPE_TRAILER);
        script.put_slice(locking_code);
        script.put_u8(OP_RETURN);
        script.put_slice(&state);
        script.put_u32_le(state.len() as u32);
        script.put_u8(STATE_VERSION);
        script
    }

    /// The state-carrying output that keeps this instance alive
    pub fn continuation_output(&self, locking_code: &[u8]) -> TxOutput {
        TxOutput::new(self.locked_value, self.continuation_script(locking_code))
    }

    /// Recover the state embedded in a continuation script
    pub fn from_locking_script(script: &[u8], locking_code: &[u8]) -> Result<Self, CodecError> {
        let body = script
            .strip_prefix(locking_code)
            .ok_or_else(|| CodecError::InvalidEnvelope("locking code mismatch".to_string()))?;

        if body.len() < 1 + ENVELOPE_TRAILER || body[0] != OP_RETURN {
            return Err(CodecError::InvalidEnvelope("missing OP_RETURN".to_string()));
        }

        let (payload, trailer) = body[1..].split_at(body.len() - 1 - ENVELOPE_TRAILER);
        if trailer[4] != STATE_VERSION {
            return Err(CodecError::InvalidEnvelope(format!(
                "unsupported state version {}",
                trailer[4]
            )));
        }

        let declared = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if declared as usize != payload.len() {
            return Err(CodecError::InvalidEnvelope(format!(
                "state length {} does not match declared {}",
                payload.len(),
                declared
            )));
        }

        Self::decode(payload)
    }

    /// Current holder of the given role
    pub fn holder(&self, role: Role) -> Identity {
        match role {
            Role::Beneficiary => self.beneficiary,
            Role::Issuer => self.issuer,
        }
    }

    /// Pending listing for the given role
    pub fn pending_payout(&self, role: Role) -> Option<&TxOutput> {
        match role {
            Role::Beneficiary => self.pending_beneficiary_payout.as_ref(),
            Role::Issuer => self.pending_issuer_payout.as_ref(),
        }
    }

    /// Replace holder and listing of a role together
    pub fn with_role(&self, role: Role, holder: Identity, pending: Option<TxOutput>) -> Self {
        let mut next = self.clone();
        match role {
            Role::Beneficiary => {
                next.beneficiary = holder;
                next.pending_beneficiary_payout = pending;
            }
            Role::Issuer => {
                next.issuer = holder;
                next.pending_issuer_payout = pending;
            }
        }
        next
    }
}

fn get_identity(buf: &mut &[u8]) -> Result<Identity, CodecError> {
    ensure(buf.remaining(), 20)?;
    let mut hash = [0u8; 20];
    buf.copy_to_slice(&mut hash);
    Ok(Identity(hash))
}

fn put_pending(buf: &mut Vec<u8>, payout: Option<&TxOutput>) {
    match payout {
        Some(output) => put_var_bytes(buf, &output.to_bytes()),
        None => put_var_bytes(buf, &[]),
    }
}

fn get_pending(buf: &mut &[u8]) -> Result<Option<TxOutput>, CodecError> {
    let bytes = get_var_bytes(buf)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    TxOutput::from_bytes(&bytes).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::header::fixtures::{header, H577267};

    fn sample_state() -> ContractState {
        ContractState::deploy(Deployment {
            beneficiary: Identity::new([0xbb; 20]),
            issuer: Identity::new([0x11; 20]),
            locked_value: 100,
            prev_header: header(H577267),
            prev_height: 577_267,
            target_bits: 0x1a35_0b34,
            required_count: 1,
            expiration_height: 577_277,
        })
        .unwrap()
    }

    #[test]
    fn test_deploy_rejects_zero_count() {
        let mut params = Deployment {
            beneficiary: Identity::default(),
            issuer: Identity::default(),
            locked_value: 1,
            prev_header: header(H577267),
            prev_height: 0,
            target_bits: 0x1d00_ffff,
            required_count: 0,
            expiration_height: 10,
        };
        assert_eq!(
            ContractState::deploy(params.clone()),
            Err(StateError::NoBlocksRequired)
        );

        params.required_count = 1;
        params.expiration_height = u64::from(LOCKTIME_THRESHOLD);
        assert!(matches!(
            ContractState::deploy(params),
            Err(StateError::ExpirationNotHeight(_))
        ));
    }

    #[test]
    fn test_deploy_rejects_tip_height_out_of_range() {
        let params = Deployment {
            beneficiary: Identity::default(),
            issuer: Identity::default(),
            locked_value: 1,
            prev_header: header(H577267),
            prev_height: u64::MAX,
            target_bits: 0x1d00_ffff,
            required_count: 1,
            expiration_height: 10,
        };
        assert_eq!(
            ContractState::deploy(params),
            Err(StateError::TipHeightOutOfRange(u64::MAX))
        );
    }

    #[test]
    fn test_decode_rejects_spent_count() {
        let mut state = sample_state();
        state.remaining_count = 0;
        let code = vec![0x51];

        assert_eq!(
            ContractState::decode(&state.encode()),
            Err(CodecError::InvalidState(StateError::NoBlocksRequired))
        );
        assert!(matches!(
            ContractState::from_locking_script(&state.continuation_script(&code), &code),
            Err(CodecError::InvalidState(StateError::NoBlocksRequired))
        ));
    }

    #[test]
    fn test_decode_rejects_tip_height_out_of_range() {
        let mut state = sample_state();
        state.prev_height = u64::MAX;
        assert_eq!(
            ContractState::decode(&state.encode()),
            Err(CodecError::InvalidState(StateError::TipHeightOutOfRange(u64::MAX)))
        );
    }

    #[test]
    fn test_encoding_layout() {
        let state = sample_state();
        let encoded = state.encode();
        // 20 + 20 + 8 + 80 + 8 + 32 + 8 + 8 + 1 + 1
        assert_eq!(encoded.len(), 186);
        assert_eq!(&encoded[..20], &[0xbb; 20]);
        assert_eq!(&encoded[40..48], &100u64.to_le_bytes());
        assert_eq!(&encoded[48..128], header(H577267).as_bytes());
    }

    #[test]
    fn test_decode_reproduces_every_field() {
        let mut state = sample_state();
        state.pending_issuer_payout = Some(TxOutput::p2pkh(&[0x42; 20], 1000));
        state.remaining_count = 7;

        let encoded = state.encode();
        let decoded = ContractState::decode(&encoded).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn test_decode_rejects_trailing_and_truncated() {
        let mut encoded = sample_state().encode();
        encoded.push(0);
        assert_eq!(
            ContractState::decode(&encoded),
            Err(CodecError::TrailingBytes(1))
        );
        assert!(ContractState::decode(&encoded[..100]).is_err());
    }

    #[test]
    fn test_locking_script_envelope() {
        let state = sample_state();
        let code = vec![0x51, 0x52, 0x53];
        let script = state.continuation_script(&code);

        assert!(script.starts_with(&code));
        assert_eq!(script[3], OP_RETURN);
        assert_eq!(*script.last().unwrap(), STATE_VERSION);
        assert_eq!(ContractState::from_locking_script(&script, &code).unwrap(), state);

        assert!(ContractState::from_locking_script(&script, &[0x00]).is_err());
        let mut bad_version = script.clone();
        *bad_version.last_mut().unwrap() = 0x01;
        assert!(ContractState::from_locking_script(&bad_version, &code).is_err());
    }

    #[test]
    fn test_with_role_changes_holder_and_listing_together() {
        let state = sample_state();
        let payout = TxOutput::p2pkh(&[0x55; 20], 500);
        let next = state.with_role(Role::Issuer, Identity::new([0x99; 20]), Some(payout.clone()));

        assert_eq!(next.holder(Role::Issuer), Identity::new([0x99; 20]));
        assert_eq!(next.pending_payout(Role::Issuer), Some(&payout));
        assert_eq!(next.holder(Role::Beneficiary), state.beneficiary);
        assert_eq!(next.pending_payout(Role::Beneficiary), None);
        // The source state is untouched
        assert_eq!(state.pending_issuer_payout, None);
    }

    #[test]
    fn test_identity_hex() {
        let id = Identity::new([0xab; 20]);
        assert_eq!(Identity::from_hex(&id.to_string()).unwrap(), id);
        assert!(Identity::from_hex("abcd").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let state = sample_state();
        let json = serde_json::to_string(&state).unwrap();
        let back: ContractState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
