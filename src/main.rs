//! beagle - find the folders that eat your disk.
//!
//! Usage:
//!   beagle [PATH]                     Launch the interactive TUI
//!   beagle summary [PATH] -s <GB>     List large folders, oldest first
//!   beagle --help                     Show help

mod logging;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::info;

use beagle_core::{GIB, ScanConfig, ScanError, ScanWarning};
use beagle_dispatch::{CentralDispatch, TaskFuture};
use beagle_scan::{
    DEFAULT_REPORT_LIMIT, FolderReport, ScanCoordinator, ScanProgress, ScanSummary, large_folders,
};
use logging::LogTarget;

#[derive(Parser)]
#[command(
    name = "beagle",
    version,
    about = "Find the folders that eat your disk",
    long_about = "beagle scans a folder tree in parallel and shows where the space goes.\n\n\
                  Launch the interactive TUI by running `beagle [PATH]`, or use \
                  `beagle summary` for a plain report of large folders."
)]
struct Cli {
    /// Path to analyze (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Tree depth shown when the TUI opens
    #[arg(short, long, default_value_t = 4)]
    depth: usize,

    #[command(flatten)]
    scan: ScanArgs,

    /// Log file for interactive sessions (defaults to beagle.log in the temp dir)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct ScanArgs {
    /// Number of folders analyzed at once
    #[arg(short = 'j', long, global = true)]
    workers: Option<usize>,

    /// Skip hidden folders
    #[arg(long, global = true)]
    no_hidden: bool,

    /// Folder names to skip (exact, `prefix*` or `*suffix`); repeatable
    #[arg(short, long = "ignore", global = true)]
    ignore: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan without the TUI and list the folders above a size
    Summary {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only list folders larger than this many gigabytes
        #[arg(short = 's', long = "min-size-gb", default_value_t = 1.0)]
        min_size_gb: f64,

        /// Maximum number of folders to list
        #[arg(short = 'n', long, default_value_t = DEFAULT_REPORT_LIMIT)]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Summary {
            ref path,
            min_size_gb,
            top,
            format,
        }) => {
            color_eyre::install()?;
            let _guard = logging::init(&cli.log_level, LogTarget::Stderr)?;
            let config = scan_config(path, &cli.scan)?;
            let output = run_summary(config, min_size_gb, top, true)?;
            write_report(&mut io::stdout().lock(), &output, min_size_gb, format)?;
        }
        None => {
            // Plain error reports: the terminal may still be in raw mode when they print.
            color_eyre::config::HookBuilder::default()
                .theme(color_eyre::config::Theme::new())
                .install()?;
            let log_file = cli.log_file.clone().unwrap_or_else(logging::default_log_file);
            let _guard = logging::init(&cli.log_level, LogTarget::File(log_file))?;

            let config = beagle_tui::TuiConfig::new(scan_config(&cli.path, &cli.scan)?)
                .with_initial_depth(cli.depth);
            beagle_tui::run_with_config(config)?;
        }
    }

    Ok(())
}

fn scan_config(path: &Path, args: &ScanArgs) -> Result<ScanConfig> {
    let root = path.canonicalize().context("Invalid path")?;

    let mut builder = ScanConfig::builder();
    builder
        .root(root)
        .include_hidden(!args.no_hidden)
        .ignore_patterns(args.ignore.clone());
    if let Some(workers) = args.workers {
        builder.workers(workers);
    }
    let config = builder.build().map_err(|e| ScanError::InvalidConfig {
        message: e.to_string(),
    })?;
    Ok(config)
}

/// Result of a non-interactive scan.
struct SummaryOutput {
    summary: ScanSummary,
    folders: Vec<FolderReport>,
    warnings: Vec<ScanWarning>,
}

/// Prints the latest scan progress on a single stderr line.
struct ProgressPrinter {
    updates: broadcast::Receiver<ScanProgress>,
}

impl ProgressPrinter {
    fn new(updates: broadcast::Receiver<ScanProgress>) -> Self {
        Self { updates }
    }

    fn tick(&mut self) {
        let mut latest = None;
        loop {
            match self.updates.try_recv() {
                Ok(progress) => latest = Some(progress),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        if let Some(progress) = latest {
            eprint!(
                "\r {} folders, {} ({:.0} folders/s)   ",
                progress.folders_scanned,
                format_size(progress.bytes_scanned),
                progress.folders_per_second()
            );
        }
    }
}

/// Scan to completion and collect the large-folder report.
fn run_summary(
    config: ScanConfig,
    min_size_gb: f64,
    top: usize,
    show_progress: bool,
) -> Result<SummaryOutput> {
    let dispatch = CentralDispatch::new();
    let coordinator = ScanCoordinator::new(&dispatch, config)?;
    let root = coordinator.config().root.clone();

    if show_progress {
        eprintln!("Scanning {}...", root.display());
    }

    // Never resolved: a summary scan always runs to completion.
    let (_keep_running, shutdown) = TaskFuture::<()>::pending();
    let progress = coordinator.subscribe();
    let done = coordinator.start(&shutdown, |_| {})?;

    let ticker = if show_progress {
        let mut printer = ProgressPrinter::new(progress);
        Some(dispatch.timer("progress", Duration::from_millis(250), move || {
            printer.tick();
            true
        })?)
    } else {
        None
    };

    let summary = done.wait().wrap_err("Scan failed")?;
    drop(ticker);
    if show_progress {
        eprintln!();
    }
    info!(folders = summary.folder_count, "summary scan finished");

    let min_size = (min_size_gb.max(0.0) * GIB as f64) as u64;
    let tree = coordinator.tree();
    let guard = tree.read();
    let tree = guard
        .as_ref()
        .ok_or_else(|| eyre!("scan finished without a folder tree"))?;

    Ok(SummaryOutput {
        summary,
        folders: large_folders(tree, min_size, top),
        warnings: coordinator.warnings(),
    })
}

fn write_report(
    out: &mut impl Write,
    output: &SummaryOutput,
    min_size_gb: f64,
    format: OutputFormat,
) -> Result<()> {
    let SummaryOutput {
        summary,
        folders,
        warnings,
    } = output;

    match format {
        OutputFormat::Text => {
            writeln!(out)?;
            writeln!(out, "{}", "─".repeat(60))?;
            writeln!(
                out,
                " {} - {}",
                summary.root.display(),
                format_size(summary.total_size)
            )?;
            writeln!(
                out,
                " {} folders, {} unreadable",
                summary.folder_count, summary.inaccessible_count
            )?;
            writeln!(out, " Scanned in {:.2}s", summary.elapsed.as_secs_f64())?;
            writeln!(out, "{}", "─".repeat(60))?;
            writeln!(out)?;

            if folders.is_empty() {
                writeln!(out, " No folders larger than {min_size_gb} GB.")?;
            }
            for folder in folders {
                writeln!(out, "{folder}")?;
            }

            if !warnings.is_empty() {
                writeln!(out)?;
                writeln!(out, " Skipped {} unreadable entries:", warnings.len())?;
                for warning in warnings {
                    writeln!(out, "   {}", warning.message)?;
                }
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "summary": summary,
                "folders": folders,
                "warnings": warnings,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
        }
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
