//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256, double SHA-256 and HASH160 hashing
//! - ECDSA key management (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{double_sha256, double_sha256_hex, hash160, sha256};
pub use keys::{
    hash_to_address, public_key_from_hex, public_key_hash, sign_digest, verify_digest, KeyError,
    KeyPair,
};
