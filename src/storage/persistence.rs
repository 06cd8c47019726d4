//! Contract record persistence
//!
//! Keeps the live contract instance on disk between CLI invocations.

use crate::core::ContractState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// A stored contract instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Last state the contract was carried forward with
    pub state: ContractState,
    /// Set once a fulfilment or refund has spent the instance
    #[serde(default)]
    pub consumed: bool,
}

impl ContractRecord {
    pub fn new(state: ContractState) -> Self {
        Self {
            state,
            consumed: false,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub record_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".difflock_data"),
            record_file: "contract.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// Contract record storage manager
pub struct StateStore {
    config: StorageConfig,
}

impl StateStore {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    /// Store under `data_dir` with the remaining defaults
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        Self::new(StorageConfig {
            data_dir: data_dir.to_path_buf(),
            ..StorageConfig::default()
        })
    }

    fn record_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.record_file)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.record_file, index))
    }

    /// Save the record, keeping the previous one as a backup
    pub fn save(&self, record: &ContractRecord) -> Result<(), StorageError> {
        let path = self.record_path();

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        let temp_path = self.config.data_dir.join("contract.tmp");
        {
            let file = fs::File::create(&temp_path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, record)?;
        }

        fs::rename(&temp_path, &path)?;
        log::debug!("Saved contract record to {}", path.display());

        Ok(())
    }

    pub fn load(&self) -> Result<ContractRecord, StorageError> {
        let path = self.record_path();

        if !path.exists() {
            return Err(StorageError::InvalidData(
                "Contract record not found".to_string(),
            ));
        }

        read_record(&path)
    }

    pub fn exists(&self) -> bool {
        self.record_path().exists()
    }

    fn rotate_backups(&self) -> Result<(), StorageError> {
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Load a backup; index 0 is the most recent
    pub fn restore_backup(&self, backup_index: usize) -> Result<ContractRecord, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        read_record(&backup_path)
    }

    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }
}

fn read_record(path: &Path) -> Result<ContractRecord, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let record: ContractRecord = serde_json::from_reader(reader)?;
    record
        .state
        .validate()
        .map_err(|e| StorageError::InvalidData(format!("{}: {}", path.display(), e)))?;
    Ok(record)
}
