//! Difficulty Lock CLI Application
//!
//! A command-line interface for deploying and driving a difficulty lock.

use clap::{Parser, Subcommand};
use difficulty_lock::cli::{self, AppState};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "difflock")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A proof-of-work difficulty lock in Rust", long_about = None)]
struct Cli {
    /// Data directory for contract storage
    #[arg(short, long, default_value = ".difflock_data")]
    data_dir: PathBuf,

    /// Lock configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new contract instance
    Init {
        /// Deployment parameters file (JSON)
        #[arg(short, long)]
        params: PathBuf,

        /// Replace an existing contract record
        #[arg(long)]
        force: bool,
    },

    /// Display the stored contract
    Show,

    /// List backups, or restore one as the current record
    Restore {
        /// Backup index to restore (0 is the most recent)
        #[arg(short, long)]
        backup: Option<usize>,
    },

    /// Decode a compact difficulty target
    Bits {
        /// Compact target as hex, e.g. 1d00ffff
        bits: String,
    },

    /// Generate a role key
    Keygen,

    /// Sign a transaction sighash with a role key
    Sign {
        /// Private key (hex)
        #[arg(short, long)]
        key: String,

        /// 32-byte sighash (hex)
        #[arg(short, long)]
        sighash: String,
    },

    /// Show the outputs an operation requires
    Plan {
        /// Operation file (JSON)
        #[arg(short, long)]
        op: PathBuf,

        /// Execution context file (JSON)
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Apply an operation and persist the result
    Apply {
        /// Operation file (JSON)
        #[arg(short, long)]
        op: PathBuf,

        /// Execution context file (JSON)
        #[arg(long)]
        context: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Key and target utilities don't need the data directory
    match &cli.command {
        Commands::Bits { bits } => return cli::cmd_bits(bits),
        Commands::Keygen => return cli::cmd_keygen(),
        Commands::Sign { key, sighash } => return cli::cmd_sign(key, sighash),
        _ => {}
    }

    let state = AppState::new(cli.data_dir.clone(), cli.config.as_deref())?;

    match cli.command {
        Commands::Bits { .. } | Commands::Keygen | Commands::Sign { .. } => unreachable!(),

        Commands::Init { params, force } => {
            cli::cmd_init(&state, &params, force)?;
        }

        Commands::Show => {
            cli::cmd_show(&state)?;
        }

        Commands::Restore { backup } => {
            cli::cmd_restore(&state, backup)?;
        }

        Commands::Plan { op, context } => {
            cli::cmd_plan(&state, &op, context.as_deref())?;
        }

        Commands::Apply { op, context } => {
            cli::cmd_apply(&state, &op, &context)?;
        }
    }

    Ok(())
}
