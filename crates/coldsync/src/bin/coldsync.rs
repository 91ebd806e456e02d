//! coldsync CLI binary
//!
//! Backs up a directory tree into a cold-tier destination, uploading only
//! what changed since the last run.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use coldsync::logging::init_logging;
use coldsync::settings::{Settings, SettingsOverrides};
use coldsync::{EngineError, FailurePolicy, Reconciler, RunReport};
use coldsync_sink::{FsSink, StorageClass};
use coldsync_store::{Inventory, SqliteInventory};

/// Incremental cold-storage backup
#[derive(Parser)]
#[command(name = "coldsync", version)]
#[command(about = "Back up a directory tree to cold storage, uploading only what changed")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./coldsync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the root and upload new or changed files
    Backup(BackupArgs),
    /// List recorded files
    Inventory {
        /// SQLite inventory file
        #[arg(long)]
        inventory: Option<PathBuf>,
    },
}

#[derive(Args)]
struct BackupArgs {
    /// Directory tree to back up
    #[arg(long)]
    root: Option<PathBuf>,

    /// SQLite inventory file
    #[arg(long)]
    inventory: Option<PathBuf>,

    /// Destination directory
    #[arg(long)]
    destination: Option<PathBuf>,

    /// Storage class (STANDARD, INFREQUENT_ACCESS, GLACIER, DEEP_ARCHIVE)
    #[arg(long)]
    storage_class: Option<StorageClass>,

    /// Keep going after a file fails instead of stopping the run
    #[arg(long)]
    continue_on_error: bool,

    /// Report recorded files that are no longer present
    #[arg(long)]
    detect_stale: bool,

    /// Per-upload timeout in seconds (0 disables)
    #[arg(long)]
    upload_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "coldsync failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut overrides = SettingsOverrides {
        log_level: cli.log_level.clone(),
        ..SettingsOverrides::default()
    };

    match &cli.command {
        Commands::Backup(args) => {
            overrides.root = args.root.clone();
            overrides.inventory = args.inventory.clone();
            overrides.destination = args.destination.clone();
            overrides.storage_class = args.storage_class;
            overrides.upload_timeout_secs = args.upload_timeout;
            if args.continue_on_error {
                overrides.failure_policy = Some(FailurePolicy::Continue);
            }
            if args.detect_stale {
                overrides.detect_stale = Some(true);
            }
        }
        Commands::Inventory { inventory } => {
            overrides.inventory = inventory.clone();
        }
    }

    let settings =
        Settings::load(cli.config.as_deref(), &overrides).context("failed to load settings")?;
    init_logging(&settings.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Backup(_) => backup(settings).await,
        Commands::Inventory { .. } => list_inventory(&settings).await,
    }
}

async fn backup(mut settings: Settings) -> Result<ExitCode> {
    let inventory = open_inventory(&settings.inventory)?;
    let sink = FsSink::new(&settings.destination).with_context(|| {
        format!(
            "failed to open destination {}",
            settings.destination.display()
        )
    })?;

    // Never back up our own state.
    settings
        .walker
        .exclude_paths
        .extend(own_paths(&settings.inventory, &settings.destination));

    let reconciler = Reconciler::new(
        Arc::new(inventory),
        Arc::new(sink),
        &settings.root,
        settings.reconciler_config(),
    );

    match reconciler.run().await {
        Ok(report) => {
            print_report(&report);
            if report.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                for failed in &report.failed {
                    eprintln!("failed: {} ({})", failed.key, failed.error);
                }
                Ok(ExitCode::FAILURE)
            }
        }
        Err(EngineError::Aborted {
            path,
            source,
            report,
        }) => {
            print_report(&report);
            eprintln!("error: backup aborted at {path}: {source}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("backup failed"),
    }
}

async fn list_inventory(settings: &Settings) -> Result<ExitCode> {
    let inventory = open_inventory(&settings.inventory)?;
    let records = inventory
        .list()
        .await
        .context("failed to read inventory")?;

    for record in &records {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            if record.uploaded { "uploaded" } else { "pending" },
            record.size,
            record.modified_ms,
            record.hash,
            record.path
        );
    }
    println!("{} file(s)", records.len());
    Ok(ExitCode::SUCCESS)
}

fn open_inventory(path: &Path) -> Result<SqliteInventory> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    SqliteInventory::open(path)
        .with_context(|| format!("failed to open inventory {}", path.display()))
}

/// Canonical paths of the inventory database (with its SQLite side files)
/// and the destination.
fn own_paths(inventory: &Path, destination: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(db) = inventory.canonicalize() {
        for suffix in ["-journal", "-wal", "-shm"] {
            let mut side = db.clone().into_os_string();
            side.push(suffix);
            paths.push(PathBuf::from(side));
        }
        paths.push(db);
    }
    if let Ok(dest) = destination.canonicalize() {
        paths.push(dest);
    }
    paths
}

fn print_report(report: &RunReport) {
    println!(
        "{} file(s): {} uploaded ({} bytes), {} unchanged, {} skipped, {} failed in {:.2?}",
        report.files_seen,
        report.uploaded,
        report.bytes_uploaded,
        report.unchanged,
        report.skipped,
        report.failed.len(),
        report.elapsed
    );
    for path in &report.stale {
        println!("stale: {path}");
    }
}
