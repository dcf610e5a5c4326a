//! hashdex - content-addressed inventory of a directory tree.
//!
//! Usage:
//!   hashdex                           Inventory the current directory
//!   hashdex --dir PATH -o out.json    Inventory PATH into out.json
//!   hashdex --algorithm md5           Use MD5 instead of BLAKE3
//!   hashdex --help                    Show help

use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use clap::{ArgAction, Parser};
use color_eyre::eyre::{Context, Result, bail};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

use hashdex_core::{FileRecord, HashAlgorithm, ScanConfig, SkipRules, SpecialEntryPolicy};
use hashdex_scan::{InventoryScanner, ScanEvent};

#[derive(Parser)]
#[command(
    name = "hashdex",
    version,
    about = "Content-addressed inventory of every file under a directory",
    long_about = "hashdex walks a directory tree and records the name, location, \
                  modification time and content digest of every regular file, \
                  then writes the records as JSON."
)]
struct Cli {
    /// Directory to scan
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Output JSON file ("-" for stdout)
    #[arg(short, long, default_value = "file_inventory.json")]
    output: PathBuf,

    /// Number of hashing workers (defaults to available parallelism)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    workers: Option<u64>,

    /// Digest algorithm (blake3 or md5)
    #[arg(short, long, default_value = "blake3")]
    algorithm: HashAlgorithm,

    /// Additional base name to exclude (repeatable)
    #[arg(long = "exclude-name", value_name = "NAME")]
    exclude_names: Vec<String>,

    /// Additional path prefix to exclude (repeatable)
    #[arg(long = "exclude-prefix", value_name = "PATH")]
    exclude_prefixes: Vec<PathBuf>,

    /// Do not apply the built-in exclusions (.git, trash folders, /proc, ...)
    #[arg(long)]
    no_default_excludes: bool,

    /// Skip symlinks and special files without reporting them
    #[arg(long)]
    silent_skips: bool,

    /// Read buffer size in bytes
    #[arg(long, default_value = "1048576")]
    buffer_size: usize,

    /// Do not print progress
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = build_config(&cli)?;
    let scanner = InventoryScanner::new();
    let reporter = (!cli.quiet).then(|| spawn_reporter(scanner.subscribe()));

    eprintln!("Scanning directory: {}", config.root.display());
    let inventory = scanner.scan(&config).context("Scan failed")?;

    if let Some(reporter) = reporter {
        // The scanner is the only sender; dropping it ends the reporter.
        drop(scanner);
        let _ = reporter.join();
    }

    if let Some(err) = &inventory.walk_error {
        bail!("Could not walk {}: {err}", inventory.root.display());
    }

    eprintln!(
        "Found {} files ({}) in {:.2}s",
        inventory.records.len(),
        format_size(inventory.stats.bytes_hashed),
        inventory.duration.as_secs_f64()
    );
    if inventory.error_count > 0 {
        eprintln!("{} error(s) during scan", inventory.error_count);
    }

    save_json(&inventory.records, &cli.output)?;
    if cli.output != Path::new("-") {
        eprintln!("Results saved to {}", cli.output.display());
    }

    Ok(())
}

/// Translate command-line flags into a scan configuration.
fn build_config(cli: &Cli) -> Result<ScanConfig> {
    let mut rules = if cli.no_default_excludes {
        SkipRules::empty()
    } else {
        SkipRules::default()
    };
    for name in &cli.exclude_names {
        rules = rules.with_name(name.clone());
    }
    for prefix in &cli.exclude_prefixes {
        rules = rules.with_prefix(prefix.clone());
    }

    let mut builder = ScanConfig::builder();
    builder
        .root(cli.dir.clone())
        .algorithm(cli.algorithm)
        .buffer_size(cli.buffer_size)
        .skip_rules(rules)
        .special_entries(if cli.silent_skips {
            SpecialEntryPolicy::Silent
        } else {
            SpecialEntryPolicy::Log
        });
    if let Some(workers) = cli.workers {
        builder.workers(usize::try_from(workers).context("Worker count too large")?);
    }

    builder.build().context("Invalid configuration")
}

/// Install the tracing subscriber. `RUST_LOG` overrides `-v`.
fn setup_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Render scan events on stderr until the scanner goes away.
fn spawn_reporter(mut events: broadcast::Receiver<ScanEvent>) -> JoinHandle<()> {
    let interactive = io::stderr().is_terminal();

    thread::spawn(move || {
        loop {
            match events.blocking_recv() {
                Ok(ScanEvent::Started { workers, .. }) => {
                    eprintln!("Hashing with {workers} workers");
                }
                Ok(ScanEvent::Progress(p)) => {
                    let line = format!(
                        "{} files hashed, {} errors ({:.0} files/s)",
                        p.files_hashed,
                        p.errors_count,
                        p.files_per_second()
                    );
                    if interactive {
                        eprint!("\r{line}");
                    } else {
                        eprintln!("{line}");
                    }
                }
                // Per-path errors and skips are already on the log.
                Ok(ScanEvent::Error { .. } | ScanEvent::Skipped { .. }) => {}
                Ok(ScanEvent::Finished(_)) => {
                    if interactive {
                        eprintln!();
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Progress display fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Write records as pretty-printed JSON. An empty inventory is written as `[]`.
fn save_json(records: &[FileRecord], output: &Path) -> Result<()> {
    if output == Path::new("-") {
        let stdout = io::stdout();
        let mut writer = BufWriter::new(stdout.lock());
        serde_json::to_writer_pretty(&mut writer, records)?;
        writeln!(writer)?;
        writer.flush()?;
        return Ok(());
    }

    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    writer.flush()?;
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
