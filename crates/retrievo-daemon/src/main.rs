//! Retrievo daemon
//!
//! Exact nearest-neighbour retrieval over stored embeddings.
//!
//! # Usage
//!
//! ```bash
//! retrievo start [--foreground] [--port PORT] [--db-path PATH] [--index-path PATH] [--dimension D]
//! retrievo stop
//! retrievo status
//! retrievo vector add --id ID --embedding "0.1,0.2,..."
//! retrievo vector search --embedding "0.1,0.2,..." [-k 5]
//! retrievo document put --text TEXT [--id ID] [--source file|paste]
//! retrievo admin verify
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/retrievo/config.toml)
//! 3. Environment variables (RETRIEVO_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use retrievo_daemon::{
    handle_admin, handle_document, handle_vector, show_status, start_daemon, stop_daemon, Cli,
    Commands, Overrides,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            foreground,
            port,
            db_path,
            index_path,
            dimension,
        } => {
            let overrides = Overrides {
                port,
                db_path,
                index_path,
                dimension,
                log_level: cli.log_level,
            };
            start_daemon(cli.config.as_deref(), foreground, overrides).await?;
        }
        Commands::Stop => {
            stop_daemon()?;
        }
        Commands::Status => {
            show_status()?;
        }
        Commands::Vector { endpoint, command } => {
            handle_vector(&endpoint, command).await?;
        }
        Commands::Document { endpoint, command } => {
            handle_document(&endpoint, command).await?;
        }
        Commands::Admin {
            db_path,
            index_path,
            dimension,
            command,
        } => {
            let overrides = Overrides {
                db_path,
                index_path,
                dimension,
                ..Default::default()
            };
            handle_admin(cli.config.as_deref(), overrides, command)?;
        }
    }

    Ok(())
}
