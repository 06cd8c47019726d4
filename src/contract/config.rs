//! Contract configuration
//!
//! Deployment-wide choices that are not part of the carried state: the
//! per-call header cap, who may submit headers, how purchases of unlisted
//! roles are treated, and the script code preceding the state envelope.

use crate::core::output::hex_bytes;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader};
use std::path::Path;
use thiserror::Error;

/// Headers processed per call by default
pub const DEFAULT_MAX_HEADERS: usize = 52;

/// Largest per-call header cap a configuration may set
pub const MAX_HEADER_CAP: usize = 1024;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("max_headers must be at least 1")]
    ZeroHeaderCap,
    #[error("max_headers {0} exceeds the limit of {}", MAX_HEADER_CAP)]
    HeaderCapTooLarge(usize),
}

/// Who may submit header evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPolicy {
    /// Anyone holding valid proof-of-work may advance the contract
    #[default]
    Permissionless,
    /// Only the current beneficiary may submit headers
    BeneficiaryGated,
}

/// Treatment of a purchase when the role has no pending listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyListingPolicy {
    /// Fail the purchase
    #[default]
    Reject,
    /// Reassign the role without any payment
    AllowFreeClaim,
}

/// Contract configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Header slots evaluated by a single call
    pub max_headers: usize,
    pub submission_policy: SubmissionPolicy,
    pub empty_listing_policy: EmptyListingPolicy,
    /// Script code placed before the state envelope of continuation outputs
    #[serde(with = "hex_bytes")]
    pub locking_code: Vec<u8>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_headers: DEFAULT_MAX_HEADERS,
            submission_policy: SubmissionPolicy::default(),
            empty_listing_policy: EmptyListingPolicy::default(),
            locking_code: Vec::new(),
        }
    }
}

impl LockConfig {
    /// Load and validate a JSON configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = fs::File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_headers == 0 {
            return Err(ConfigError::ZeroHeaderCap);
        }
        if self.max_headers > MAX_HEADER_CAP {
            return Err(ConfigError::HeaderCapTooLarge(self.max_headers));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LockConfig::default();
        assert_eq!(config.max_headers, 52);
        assert_eq!(config.submission_policy, SubmissionPolicy::Permissionless);
        assert_eq!(config.empty_listing_policy, EmptyListingPolicy::Reject);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LockConfig =
            serde_json::from_str(r#"{"submission_policy":"beneficiary_gated","locking_code":"51"}"#)
                .unwrap();
        assert_eq!(config.submission_policy, SubmissionPolicy::BeneficiaryGated);
        assert_eq!(config.locking_code, vec![0x51]);
        assert_eq!(config.max_headers, DEFAULT_MAX_HEADERS);
    }

    #[test]
    fn test_load_rejects_zero_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"max_headers":0}"#).unwrap();
        assert!(matches!(LockConfig::load(&path), Err(ConfigError::ZeroHeaderCap)));
    }

    #[test]
    fn test_load_rejects_oversized_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"max_headers":1000000000000000}"#).unwrap();
        assert!(matches!(
            LockConfig::load(&path),
            Err(ConfigError::HeaderCapTooLarge(1_000_000_000_000_000))
        ));

        let at_limit = LockConfig {
            max_headers: MAX_HEADER_CAP,
            ..LockConfig::default()
        };
        assert!(at_limit.validate().is_ok());
    }
}
