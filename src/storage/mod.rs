//! Storage module for contract persistence

pub mod persistence;

pub use persistence::{ContractRecord, StateStore, StorageConfig, StorageError};
