//! Retrievo daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (start, stop, status, client and admin commands)

pub mod cli;
pub mod commands;

pub use cli::{AdminCommands, Cli, Commands, DocumentCommands, VectorCommands};
pub use commands::{
    handle_admin, handle_document, handle_vector, show_status, start_daemon, stop_daemon,
    Overrides,
};
