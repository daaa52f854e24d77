//! CLI entry point for the homecloud sync agent.
//!
//! This binary watches a local directory, tracks the sync status of every
//! file in it, and prints status changes as they happen.
//!
//! # Usage
//!
//! ```bash
//! homecloud [OPTIONS] <COMMAND>
//!
//! # One-shot scan of the watch directory
//! homecloud scan --watch-dir ~/homecloud
//!
//! # Watch and stream status changes as JSON lines
//! homecloud watch --json
//!
//! # Create the default configuration file
//! homecloud config init
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::Utf8PathBuf;
use hc_core::{Config, FileRecord};
use hc_sync::{ScanReport, SyncEngine, SyncStats, scan_once};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Local sync agent: watches a directory and tracks per-file sync status.
#[derive(clap::Parser)]
#[command(name = "homecloud", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file.
    ///
    /// Defaults to `~/.homecloud/config.json`.
    #[arg(short, long, global = true, env = "HOMECLOUD_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Directory to watch, overriding the first configured entry.
    #[arg(short, long, global = true, env = "HOMECLOUD_WATCH_DIR")]
    watch_dir: Option<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Scan the watch directory once and print every record.
    Scan {
        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the sync engine and print status changes until interrupted.
    Watch {
        /// Print each status change as one JSON line.
        #[arg(long)]
        json: bool,
    },

    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// `config` subcommands.
#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration file location.
    Path,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default. Logs go
/// to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn config_path(cli: &Cli) -> color_eyre::Result<Utf8PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Ok(Config::default_path()?),
    }
}

/// Loads the configuration and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the result is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let path = config_path(cli)?;
    let mut config = Config::load(&path)?;

    if let Some(dir) = &cli.watch_dir {
        config.set_watch_dir(dir.clone());
    }
    config.validate()?;

    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Runs a one-shot scan and prints the records.
async fn run_scan(config: &Config, json: bool) -> color_eyre::Result<()> {
    let root = config.watch_dir().map(ToString::to_string).unwrap_or_default();
    info!(root = %root, "Starting scan");

    let report = scan_once(config).await?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut handle, &report.sorted_records())?;
        writeln!(handle)?;
    } else {
        print_records(&mut handle, &report)?;
    }

    Ok(())
}

/// Runs the engine until Ctrl-C or SIGTERM, printing every status change.
async fn run_watch(config: Config, json: bool) -> color_eyre::Result<()> {
    let engine = SyncEngine::new(config)?;
    let mut updates = engine
        .subscribe()
        .ok_or_else(|| color_eyre::eyre::eyre!("status stream already taken"))?;

    engine.start().await?;

    let result = async {
        #[cfg(unix)]
        let mut sigterm = {
            use tokio::signal::unix::{SignalKind, signal};
            signal(SignalKind::terminate())?
        };

        loop {
            #[cfg(unix)]
            let terminate = sigterm.recv();
            #[cfg(not(unix))]
            let terminate = std::future::pending::<Option<()>>();

            tokio::select! {
                update = updates.recv() => match update {
                    Some(record) => print_update(&record, json)?,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl-C, shutting down");
                    break;
                }
                _ = terminate => {
                    info!("Received SIGTERM, shutting down");
                    break;
                }
            }
        }
        color_eyre::Result::<()>::Ok(())
    }
    .await;

    engine.stop().await;
    log_stats(&engine.stats());
    result
}

/// Prints, creates, or locates the configuration file.
fn run_config(cli: &Cli, action: &ConfigAction) -> color_eyre::Result<()> {
    let path = config_path(cli)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    match action {
        ConfigAction::Show => {
            let config = build_config(cli)?;
            serde_json::to_writer_pretty(&mut handle, &config)?;
            writeln!(handle)?;
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                return Err(color_eyre::eyre::eyre!(
                    "Config file already exists: {path} (use --force to overwrite)"
                ));
            }
            Config::default().save(&path)?;
            info!(path = %path, "Config written");
        }
        ConfigAction::Path => writeln!(handle, "{path}")?,
    }

    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Prints the scan result as an indented table.
fn print_records(out: &mut impl Write, report: &ScanReport) -> std::io::Result<()> {
    for record in report.sorted_records() {
        print_record_line(out, record, 0)?;
        for child in record.children.values() {
            print_record_line(out, child, 1)?;
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "{} records ({} files, {} directories), {} skipped in {:.2?}",
        report.total_records(),
        report.files,
        report.directories,
        report.errors,
        report.elapsed
    )
}

fn print_record_line(
    out: &mut impl Write,
    record: &FileRecord,
    depth: usize,
) -> std::io::Result<()> {
    let indent = "  ".repeat(depth);
    let name = if depth == 0 {
        record.path.as_str()
    } else {
        record.file_name().unwrap_or_else(|| record.path.as_str())
    };
    let kind = if record.is_directory { "dir" } else { "file" };
    writeln!(
        out,
        "{:<11} {:<4} {:>10}  {indent}{name}",
        record.status.label(),
        kind,
        record.size
    )
}

/// Prints one status change.
fn print_update(record: &FileRecord, json: bool) -> color_eyre::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    if json {
        serde_json::to_writer(&mut handle, record)?;
        writeln!(handle)?;
    } else if record.is_removed() {
        writeln!(handle, "{:<11} {}", "REMOVED", record.path)?;
    } else {
        writeln!(handle, "{:<11} {}", record.status.label(), record.path)?;
    }
    handle.flush()?;

    Ok(())
}

fn log_stats(stats: &SyncStats) {
    info!(
        events = stats.events,
        uploads = stats.uploads,
        upload_failures = stats.upload_failures,
        deletes = stats.deletes,
        dropped = stats.bus.dropped,
        "Session summary"
    );
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    use clap::Parser;

    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Route to appropriate command
    let result = match &cli.command {
        Commands::Scan { json } => {
            let config = build_config(&cli)?;
            run_scan(&config, *json).await
        }
        Commands::Watch { json } => {
            let config = build_config(&cli)?;
            run_watch(config, *json).await
        }
        Commands::Config { action } => run_config(&cli, action),
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}
