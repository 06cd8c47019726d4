//! CLI commands for the difficulty lock
//!
//! Implements all command handlers for the CLI interface.

use crate::contract::{DifficultyLock, LockConfig, Operation, RoleSignature, Transition};
use crate::core::{decode_compact_detailed, ContractState, Deployment, ExecutionContext, OutputSet};
use crate::crypto::KeyPair;
use crate::storage::{ContractRecord, StateStore};
use serde::de::DeserializeOwned;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub store: StateStore,
    pub lock: DifficultyLock,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Open the data directory and load the lock configuration
    pub fn new(data_dir: PathBuf, config_path: Option<&Path>) -> CliResult<Self> {
        let store = StateStore::open(&data_dir)?;
        let config = match config_path {
            Some(path) => LockConfig::load(path)?,
            None => LockConfig::default(),
        };
        log::debug!(
            "Loaded lock config: {} header slots, {:?} submission",
            config.max_headers,
            config.submission_policy
        );

        Ok(Self {
            store,
            lock: DifficultyLock::new(config),
            data_dir,
        })
    }

    /// Load the live contract record
    fn live_record(&self) -> CliResult<ContractRecord> {
        let record = self.store.load()?;
        if record.consumed {
            return Err("contract has already been spent".into());
        }
        Ok(record)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let file = fs::File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn parse_hash(hex_str: &str) -> CliResult<[u8; 32]> {
    let bytes = hex::decode(hex_str.trim_start_matches("0x"))?;
    let hash: [u8; 32] = bytes
        .try_into()
        .map_err(|_| "sighash must be 32 bytes")?;
    Ok(hash)
}

/// Parse a compact target given as hex, with or without a `0x` prefix
pub fn parse_bits(text: &str) -> CliResult<u32> {
    Ok(u32::from_str_radix(text.trim_start_matches("0x"), 16)?)
}

// =============================================================================
// Contract lifecycle
// =============================================================================

/// Create a new contract instance from deployment parameters
pub fn cmd_init(state: &AppState, params: &Path, force: bool) -> CliResult<()> {
    if state.store.exists() && !force {
        println!("⚠️  Contract already exists at {:?}", state.data_dir);
        println!("   Use --force to reinitialize (this will replace the stored record)");
        return Ok(());
    }

    let deployment: Deployment = read_json(params)?;
    let contract = ContractState::deploy(deployment)?;
    state.store.save(&ContractRecord::new(contract.clone()))?;

    println!("✅ Difficulty lock initialized!");
    println!("   📁 Data directory: {:?}", state.data_dir);
    println!("   💰 Locked value: {}", contract.locked_value);
    println!("   🧱 Tip: {} (height {})", contract.prev_header.hash_hex(), contract.prev_height);
    println!("   🎯 Qualifying blocks required: {}", contract.remaining_count);
    println!("   ⏰ Expires at height: {}", contract.expiration_height);

    Ok(())
}

/// Print the stored contract
pub fn cmd_show(state: &AppState) -> CliResult<()> {
    let record = state.store.load()?;
    let contract = &record.state;

    println!("📊 Difficulty Lock");
    println!("   Status: {}", if record.consumed { "spent" } else { "live" });
    println!("   Beneficiary: {} ({})", contract.beneficiary.to_address(), contract.beneficiary);
    println!("   Issuer: {} ({})", contract.issuer.to_address(), contract.issuer);
    println!("   Locked value: {}", contract.locked_value);
    println!("   Tip: {}", contract.prev_header.hash_hex());
    println!("   Tip height: {}", contract.prev_height);
    println!("   Target difficulty: {:#x}", contract.target_difficulty);
    println!("   Remaining qualifying blocks: {}", contract.remaining_count);
    println!("   Expiration height: {}", contract.expiration_height);
    for (label, payout) in [
        ("Beneficiary listing", &contract.pending_beneficiary_payout),
        ("Issuer listing", &contract.pending_issuer_payout),
    ] {
        match payout {
            Some(output) => println!(
                "   {}: {} to script {}",
                label,
                output.value,
                hex::encode(&output.script)
            ),
            None => println!("   {}: none", label),
        }
    }
    println!(
        "   Continuation script: {}",
        hex::encode(contract.continuation_script(&state.lock.config().locking_code))
    );

    Ok(())
}

/// List backups, or make one of them the current record
pub fn cmd_restore(state: &AppState, backup: Option<usize>) -> CliResult<()> {
    let Some(index) = backup else {
        let backups = state.store.list_backups();
        if backups.is_empty() {
            println!("📭 No backups found in {:?}", state.data_dir);
            return Ok(());
        }
        println!("📋 Backups (0 is the most recent):");
        for index in backups {
            let record = state.store.restore_backup(index)?;
            println!(
                "   #{} tip height {}, {} remaining{}",
                index,
                record.state.prev_height,
                record.state.remaining_count,
                if record.consumed { ", spent" } else { "" }
            );
        }
        return Ok(());
    };

    let record = state.store.restore_backup(index)?;
    state.store.save(&record)?;
    log::info!("Restored contract record from backup {}", index);

    println!("✅ Restored backup #{}", index);
    println!("   🧱 Tip height: {}", record.state.prev_height);
    println!("   🎯 Remaining qualifying blocks: {}", record.state.remaining_count);

    Ok(())
}

// =============================================================================
// Operations
// =============================================================================

fn print_outputs(outputs: &OutputSet) {
    println!("   Required outputs:");
    for (i, output) in outputs.outputs.iter().enumerate() {
        println!("   ├─ #{} value {} script {}", i, output.value, hex::encode(&output.script));
    }
    println!("   ├─ Serialized: {}", hex::encode(outputs.serialize()));
    println!("   └─ Commitment: {}", hex::encode(outputs.commitment()));
}

fn print_transition(transition: &Transition) {
    println!("   Kind: {:?}", transition.kind);
    match &transition.outputs {
        Some(outputs) => print_outputs(outputs),
        None => println!("   Outputs: unconstrained"),
    }
    if let Some(successor) = &transition.successor {
        println!(
            "   Successor: tip height {}, {} qualifying blocks remaining",
            successor.prev_height, successor.remaining_count
        );
    }
}

/// Show the outputs an operation would require, without the commitment check
pub fn cmd_plan(state: &AppState, op: &Path, context: Option<&Path>) -> CliResult<()> {
    let record = state.live_record()?;
    let operation: Operation = read_json(op)?;
    let ctx = match context {
        Some(path) => read_json(path)?,
        None => ExecutionContext::new([0u8; 32]),
    };

    let transition = state.lock.prepare(&record.state, &operation, &ctx)?;

    println!("📝 Plan for {}", operation.name());
    print_transition(&transition);

    Ok(())
}

/// Apply an operation and persist the result
pub fn cmd_apply(state: &AppState, op: &Path, context: &Path) -> CliResult<()> {
    let mut record = state.live_record()?;
    let operation: Operation = read_json(op)?;
    let ctx: ExecutionContext = read_json(context)?;

    let transition = state.lock.apply(&record.state, &operation, &ctx)?;

    match transition.successor.clone() {
        Some(successor) => record.state = successor,
        None => record.consumed = true,
    }
    state.store.save(&record)?;

    println!("✅ Applied {}", operation.name());
    print_transition(&transition);
    if record.consumed {
        println!("\n   🔒 Contract spent; no further operations are accepted.");
    }

    Ok(())
}

// =============================================================================
// Utilities
// =============================================================================

/// Decode a compact target
pub fn cmd_bits(bits: &str) -> CliResult<()> {
    let bits = parse_bits(bits)?;
    let compact = decode_compact_detailed(bits);

    println!("🎯 Compact target {:#010x}", bits);
    println!("   Target: {:#x}", compact.target);
    println!("   Negative: {}", compact.negative);
    println!("   Overflow: {}", compact.overflow);

    Ok(())
}

/// Generate a role key
pub fn cmd_keygen() -> CliResult<()> {
    let key = KeyPair::generate();
    let identity = key.identity_hash();

    println!("🔐 New key generated!");
    println!("   🔑 Private key: {}", key.private_key_hex());
    println!("   📢 Public key: {}", key.public_key_hex());
    println!("   🪪 Identity: {}", hex::encode(identity));
    println!("   📍 Address: {}", crate::crypto::hash_to_address(&identity));
    println!("\n   ⚠️  IMPORTANT: Store the private key safely; it controls the role.");

    Ok(())
}

/// Sign a sighash, printing the signature in operation JSON form
pub fn cmd_sign(key: &str, sighash: &str) -> CliResult<()> {
    let key = KeyPair::from_private_key_hex(key)?;
    let sighash = parse_hash(sighash)?;

    let signature = RoleSignature::new(key.public_key, key.sign(&sighash));
    println!("{}", serde_json::to_string_pretty(&signature)?);

    Ok(())
}
