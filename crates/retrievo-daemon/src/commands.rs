//! Command implementations for the retrievo daemon.
//!
//! Handles:
//! - start: Load config, open storage and index, start gRPC server
//! - stop: Signal running daemon to stop (via PID file)
//! - status: Check if daemon is running
//! - vector / document: Thin gRPC client calls
//! - admin: Offline inspection of the document store and index file

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use retrievo_client::RetrievoClient;
use retrievo_service::{run_server_with_shutdown, RetrievalConfig, RetrievalService};
use retrievo_storage::Storage;
use retrievo_types::{DocumentSource, Settings};
use retrievo_vector::{IndexFile, VectorError};

use crate::cli::{AdminCommands, DocumentCommands, VectorCommands};

/// CLI flags that override loaded settings.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub port: Option<u16>,
    pub db_path: Option<String>,
    pub index_path: Option<String>,
    pub dimension: Option<usize>,
    pub log_level: Option<String>,
}

impl Overrides {
    /// Apply on top of `settings` and re-validate.
    pub fn apply(self, settings: &mut Settings) -> Result<()> {
        if let Some(port) = self.port {
            settings.grpc_port = port;
        }
        if let Some(db_path) = self.db_path {
            settings.db_path = db_path;
        }
        if let Some(index_path) = self.index_path {
            settings.index_path = index_path;
        }
        if let Some(dimension) = self.dimension {
            settings.dimension = dimension;
        }
        if let Some(log_level) = self.log_level {
            settings.log_level = log_level;
        }
        settings.validate().context("Invalid configuration")?;
        Ok(())
    }
}

fn load_settings(config_path: Option<&str>, overrides: Overrides) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    overrides.apply(&mut settings)?;
    Ok(settings)
}

/// Get the PID file path
fn pid_file_path() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| {
            #[cfg(unix)]
            {
                dirs.runtime_dir()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| dirs.cache_dir().to_path_buf())
            }
            #[cfg(not(unix))]
            {
                dirs.cache_dir().to_path_buf()
            }
        })
        .unwrap_or_else(std::env::temp_dir)
        .join("retrievo")
        .join("daemon.pid")
}

fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, std::process::id().to_string())?;
    info!("Wrote PID file: {:?}", pid_path);
    Ok(())
}

fn remove_pid_file() {
    let pid_path = pid_file_path();
    if pid_path.exists() {
        if let Err(e) = fs::remove_file(&pid_path) {
            warn!("Failed to remove PID file: {}", e);
        } else {
            info!("Removed PID file");
        }
    }
}

fn read_pid_file() -> Option<u32> {
    fs::read_to_string(pid_file_path())
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Check if a process is running
#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    // Signal 0 only checks that the process exists.
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Start the retrievo daemon.
///
/// 1. Load configuration (defaults -> file -> env -> CLI)
/// 2. Open the document store and load the vector index
/// 3. Start gRPC server
/// 4. Handle graceful shutdown on SIGINT/SIGTERM
pub async fn start_daemon(
    config_path: Option<&str>,
    foreground: bool,
    overrides: Overrides,
) -> Result<()> {
    let settings = load_settings(config_path, overrides)?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Retrievo daemon starting...");
    info!("Configuration:");
    info!("  Database path: {}", settings.db_path);
    info!("  Index path: {}", settings.index_path);
    info!("  Dimension: {}", settings.dimension);
    info!("  gRPC address: {}", settings.grpc_addr());
    info!("  Log level: {}", settings.log_level);

    if !foreground {
        warn!("Background mode not supported, running in foreground");
        warn!("Use a process manager (systemd, launchd) for background operation");
    }

    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let storage = Arc::new(Storage::open(&db_path).context("Failed to open storage")?);

    let config = RetrievalConfig::from_settings(&settings);
    let retrieval = RetrievalService::open(config, storage.clone())
        .context("Failed to load vector index")?;
    let retrieval = Arc::new(retrieval);

    write_pid_file()?;

    let addr: SocketAddr = settings
        .grpc_addr()
        .parse()
        .context("Invalid gRPC address")?;

    let result = run_server_with_shutdown(addr, retrieval, storage, shutdown_signal()).await;

    remove_pid_file();

    result.map_err(|e| anyhow::anyhow!("Server error: {}", e))
}

/// Stop the running daemon by sending SIGTERM.
pub fn stop_daemon() -> Result<()> {
    let pid = read_pid_file().context("No PID file found - daemon may not be running")?;

    if !is_process_running(pid) {
        remove_pid_file();
        anyhow::bail!("Daemon not running (stale PID file removed)");
    }

    info!("Stopping daemon (PID {})", pid);

    #[cfg(unix)]
    {
        unsafe {
            if libc::kill(pid as i32, libc::SIGTERM) != 0 {
                anyhow::bail!("Failed to send SIGTERM to daemon");
            }
        }
        println!("Sent SIGTERM to daemon (PID {})", pid);
    }

    #[cfg(not(unix))]
    {
        anyhow::bail!("Stop command not supported on this platform");
    }

    Ok(())
}

/// Show daemon status.
pub fn show_status() -> Result<()> {
    let pid_path = pid_file_path();

    match read_pid_file() {
        Some(pid) if is_process_running(pid) => {
            println!("Retrievo daemon is running (PID {})", pid);
            println!("PID file: {:?}", pid_path);
        }
        Some(pid) => {
            println!(
                "Retrievo daemon is NOT running (stale PID {} in {:?})",
                pid, pid_path
            );
        }
        None => {
            println!("Retrievo daemon is NOT running (no PID file)");
        }
    }
    Ok(())
}

/// Parse "0.1, 0.2,-3" into components.
pub fn parse_embedding(input: &str) -> Result<Vec<f32>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f32>()
                .with_context(|| format!("Invalid embedding component: {:?}", s))
        })
        .collect()
}

/// Handle vector commands.
pub async fn handle_vector(endpoint: &str, command: VectorCommands) -> Result<()> {
    let mut client = RetrievoClient::connect(endpoint)
        .await
        .context("Failed to connect to daemon")?;

    match command {
        VectorCommands::Add { id, embedding } => {
            let embedding = parse_embedding(&embedding)?;
            let count = client.add_vector(&id, embedding).await?;
            println!("ok (count: {})", count);
        }
        VectorCommands::Search { embedding, top_k } => {
            let embedding = parse_embedding(&embedding)?;
            let results = client.search(embedding, top_k).await?;
            if results.is_empty() {
                println!("No results");
            }
            for (rank, hit) in results.iter().enumerate() {
                println!(
                    "{:>3}. {:<28} {:>12.6}  {}",
                    rank + 1,
                    hit.id,
                    hit.distance,
                    preview(&hit.text)
                );
            }
        }
        VectorCommands::Status => {
            let status = client.index_status().await?;
            println!("Vectors:    {}", status.count);
            println!("Dimension:  {}", status.dimension);
            println!("Index path: {}", status.index_path);
            println!("Size:       {} bytes", status.size_bytes);
        }
    }
    Ok(())
}

/// Handle document commands.
pub async fn handle_document(endpoint: &str, command: DocumentCommands) -> Result<()> {
    let mut client = RetrievoClient::connect(endpoint)
        .await
        .context("Failed to connect to daemon")?;

    match command {
        DocumentCommands::Put { text, id, source } => {
            let source: DocumentSource = source.parse()?;
            let (id, created) = client.put_document(id.as_deref(), &text, source).await?;
            if created {
                println!("Stored {}", id);
            } else {
                println!("Already stored {}", id);
            }
        }
        DocumentCommands::Get { id } => match client.get_document(&id).await? {
            Some(doc) => {
                println!("ID:      {}", doc.id);
                println!("Source:  {}", doc.source);
                println!("Created: {}", doc.created_at.to_rfc3339());
                println!();
                println!("{}", doc.text);
            }
            None => println!("Document not found: {}", id),
        },
    }
    Ok(())
}

fn preview(text: &str) -> String {
    const MAX: usize = 60;
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > MAX {
        format!("{}...", line.chars().take(MAX).collect::<String>())
    } else {
        line.to_string()
    }
}

/// Result of an offline index check.
#[derive(Debug, PartialEq, Eq)]
pub struct VerifyReport {
    pub vectors: usize,
    pub dimension: usize,
    pub distinct_ids: usize,
    /// Bound ids with no stored document, `None` if the store was not checked
    pub missing_documents: Option<Vec<String>>,
}

/// Load the index file and cross-check bound ids against `storage`.
pub fn verify_index(
    index_file: &IndexFile,
    dimension: usize,
    storage: Option<&Storage>,
) -> Result<Option<VerifyReport>> {
    let state = match index_file.load(dimension) {
        Ok(state) => state,
        Err(VectorError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e).context("Index file failed verification"),
    };
    state
        .check_consistency()
        .context("Index file failed verification")?;

    let missing_documents = match storage {
        Some(storage) => {
            let mut missing = Vec::new();
            let mut seen = std::collections::HashSet::new();
            for id in state.ids().iter() {
                if seen.insert(id) && storage.get_document(id)?.is_none() {
                    missing.push(id.to_string());
                }
            }
            Some(missing)
        }
        None => None,
    };

    Ok(Some(VerifyReport {
        vectors: state.count(),
        dimension: state.dimension(),
        distinct_ids: state.ids().distinct_ids(),
        missing_documents,
    }))
}

/// Handle admin commands. These open the stores directly and should be run
/// while the daemon is stopped.
pub fn handle_admin(
    config_path: Option<&str>,
    overrides: Overrides,
    command: AdminCommands,
) -> Result<()> {
    let settings = load_settings(config_path, overrides)?;
    let index_file = IndexFile::new(settings.expanded_index_path());
    let db_path = settings.expanded_db_path();

    match command {
        AdminCommands::Stats => {
            let storage = Storage::open(&db_path)
                .with_context(|| format!("Failed to open storage at {:?}", db_path))?;
            let stats = storage.get_stats()?;

            println!("Document store: {:?}", db_path);
            println!("  Documents:  {}", stats.document_count);
            println!("  Disk usage: {} bytes", stats.disk_usage_bytes);
            println!("Vector index: {:?}", index_file.path());
            if index_file.exists() {
                println!("  Size:       {} bytes", index_file.size_bytes());
            } else {
                println!("  (no index file)");
            }
        }
        AdminCommands::Verify => {
            let storage = match Storage::open(&db_path) {
                Ok(storage) => Some(storage),
                Err(e) => {
                    warn!("Skipping document check, storage unavailable: {}", e);
                    None
                }
            };

            match verify_index(&index_file, settings.dimension, storage.as_ref())? {
                None => println!("No index file at {:?}", index_file.path()),
                Some(report) => {
                    println!("Index OK: {:?}", index_file.path());
                    println!("  Vectors:      {}", report.vectors);
                    println!("  Dimension:    {}", report.dimension);
                    println!("  Distinct ids: {}", report.distinct_ids);
                    match report.missing_documents {
                        Some(missing) if missing.is_empty() => {
                            println!("  All bound ids have documents");
                        }
                        Some(missing) => {
                            println!("  {} bound ids have no document:", missing.len());
                            for id in missing {
                                println!("    {}", id);
                            }
                        }
                        None => println!("  Document check skipped"),
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrievo_types::Document;
    use retrievo_vector::IndexState;
    use tempfile::TempDir;

    #[test]
    fn test_pid_file_path() {
        let path = pid_file_path();
        assert!(path.ends_with("daemon.pid"));
        assert!(path.parent().unwrap().to_string_lossy().contains("retrievo"));
    }

    #[test]
    fn test_status_no_daemon() {
        assert!(show_status().is_ok());
    }

    #[test]
    fn test_parse_embedding() {
        assert_eq!(parse_embedding("1, -0.5,2e-1").unwrap(), vec![1.0, -0.5, 0.2]);
        assert_eq!(parse_embedding("3,").unwrap(), vec![3.0]);
        assert!(parse_embedding("1,abc").is_err());
    }

    #[test]
    fn test_overrides_apply_and_validate() {
        let mut settings = Settings::default();
        Overrides {
            port: Some(6000),
            dimension: Some(4),
            index_path: Some("/tmp/retrievo-idx".to_string()),
            ..Default::default()
        }
        .apply(&mut settings)
        .unwrap();
        assert_eq!(settings.grpc_port, 6000);
        assert_eq!(settings.dimension, 4);
        assert_eq!(settings.index_path, "/tmp/retrievo-idx");

        let bad = Overrides {
            dimension: Some(0),
            ..Default::default()
        };
        assert!(bad.apply(&mut settings).is_err());
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short\nsecond line"), "short");
        let long = "x".repeat(100);
        assert_eq!(preview(&long).len(), 63);
    }

    #[test]
    fn test_verify_index() {
        let temp = TempDir::new().unwrap();
        let index_file = IndexFile::new(temp.path().join("index"));
        assert!(verify_index(&index_file, 2, None).unwrap().is_none());

        let mut state = IndexState::new(2);
        state.append_bound(&[0.0, 1.0], "kept").unwrap();
        state.append_bound(&[1.0, 0.0], "lost").unwrap();
        state.append_bound(&[1.0, 1.0], "kept").unwrap();
        index_file.flush(&state).unwrap();

        let storage = Storage::open(&temp.path().join("db")).unwrap();
        storage
            .put_document(&Document::new("kept", "text", DocumentSource::Paste))
            .unwrap();

        let report = verify_index(&index_file, 2, Some(&storage)).unwrap().unwrap();
        assert_eq!(
            report,
            VerifyReport {
                vectors: 3,
                dimension: 2,
                distinct_ids: 2,
                missing_documents: Some(vec!["lost".to_string()]),
            }
        );

        assert!(verify_index(&index_file, 3, None).is_err());
    }
}
