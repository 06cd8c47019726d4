//! Command-line interface

pub mod commands;

pub use commands::{
    cmd_apply, cmd_bits, cmd_init, cmd_keygen, cmd_plan, cmd_restore, cmd_show, cmd_sign, parse_bits,
    AppState, CliResult,
};
