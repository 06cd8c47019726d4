//! ECDSA key management for role holders
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve (same as Bitcoin). Role identities are
//! the HASH160 of a compressed public key.

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::{double_sha256, hash160};

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// HASH160 of the compressed public key
    pub fn identity_hash(&self) -> [u8; 20] {
        public_key_hash(&self.public_key)
    }

    /// Sign a 32-byte sighash with the private key
    pub fn sign(&self, sighash: &[u8; 32]) -> Vec<u8> {
        sign_digest(&self.secret_key, sighash)
    }
}

/// HASH160 of a compressed public key
pub fn public_key_hash(public_key: &PublicKey) -> [u8; 20] {
    hash160(&public_key.serialize())
}

/// Render a 20-byte public key hash as a Base58Check address (version 0x00)
pub fn hash_to_address(pubkey_hash: &[u8; 20]) -> String {
    let mut address_bytes = vec![0x00];
    address_bytes.extend_from_slice(pubkey_hash);

    // Checksum is the first 4 bytes of double SHA256
    let checksum = double_sha256(&address_bytes);
    address_bytes.extend_from_slice(&checksum[..4]);

    bs58::encode(address_bytes).into_string()
}

/// Parse a public key from hex string
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)
}

/// Sign a 32-byte digest, returning the compact 64-byte signature
pub fn sign_digest(secret_key: &SecretKey, digest: &[u8; 32]) -> Vec<u8> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(*digest);
    let signature = secp.sign_ecdsa(&message, secret_key);
    signature.serialize_compact().to_vec()
}

/// Verify a compact signature over a 32-byte digest
pub fn verify_digest(
    public_key: &PublicKey,
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);
    let sig = secp256k1::ecdsa::Signature::from_compact(signature)
        .map_err(|_| KeyError::InvalidSignature)?;

    match secp.verify_ecdsa(&message, &sig, public_key) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}
