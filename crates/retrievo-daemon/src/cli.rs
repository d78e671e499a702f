//! CLI argument parsing for the retrievo daemon.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

use retrievo_client::DEFAULT_ENDPOINT;

/// Retrievo
///
/// Exact nearest-neighbour retrieval over stored embeddings.
#[derive(Parser, Debug)]
#[command(name = "retrievo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/retrievo/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the retrievo daemon
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(short, long)]
        foreground: bool,

        /// Override gRPC port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override document database path
        #[arg(long)]
        db_path: Option<String>,

        /// Override vector index directory
        #[arg(long)]
        index_path: Option<String>,

        /// Override embedding dimension
        #[arg(long)]
        dimension: Option<usize>,
    },

    /// Stop the running daemon
    Stop,

    /// Show daemon status
    Status,

    /// Add and search vectors
    Vector {
        /// gRPC endpoint
        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        #[command(subcommand)]
        command: VectorCommands,
    },

    /// Store and fetch documents
    Document {
        /// gRPC endpoint
        #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,

        #[command(subcommand)]
        command: DocumentCommands,
    },

    /// Offline administrative commands
    Admin {
        /// Document database path (default from config)
        #[arg(long)]
        db_path: Option<String>,

        /// Vector index directory (default from config)
        #[arg(long)]
        index_path: Option<String>,

        /// Embedding dimension (default from config)
        #[arg(long)]
        dimension: Option<usize>,

        #[command(subcommand)]
        command: AdminCommands,
    },
}

/// Vector subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum VectorCommands {
    /// Add an embedding bound to a document id
    Add {
        /// External document id
        #[arg(long)]
        id: String,

        /// Comma-separated components, e.g. "0.1,0.2,0.3"
        #[arg(long, allow_hyphen_values = true)]
        embedding: String,
    },

    /// Search for the nearest documents
    Search {
        /// Comma-separated query components
        #[arg(long, allow_hyphen_values = true)]
        embedding: String,

        /// Number of results (server default when omitted)
        #[arg(short = 'k', long)]
        top_k: Option<u32>,
    },

    /// Show vector index status
    Status,
}

/// Document subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum DocumentCommands {
    /// Store a document
    Put {
        /// Document text
        #[arg(long)]
        text: String,

        /// Document id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Where the text came from: file or paste
        #[arg(long, default_value = "paste")]
        source: String,
    },

    /// Fetch a document by id
    Get {
        /// Document id
        id: String,
    },
}

/// Admin subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Show document store and index statistics
    Stats,

    /// Load the index file and check it against the document store
    Verify,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
