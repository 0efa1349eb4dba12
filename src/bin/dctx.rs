//! # dctx - Directory snapshots for language models
//!
//! Command-line interface for the dircontxt library.
//!
//! ## Features
//! - Capture a directory into a `.dircontxt` archive and an LLM-readable text file
//! - Track versions and write a diff file describing what changed
//! - Copy a snapshot straight to the clipboard
//! - Inspect archives and extract single files
//!
//! ## Usage
//! ```bash
//! # Snapshot a project (writes ../my_project.dircontxt and ../my_project.llmcontext.txt)
//! dctx snapshot ./my_project
//!
//! # Copy a snapshot to the clipboard without touching existing artifacts
//! dctx snapshot ./my_project --clipboard
//!
//! # See what changed since the last snapshot
//! dctx status ./my_project
//!
//! # Look inside an archive
//! dctx inspect ../my_project.dircontxt
//! dctx cat ../my_project.dircontxt src/main.rs
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dircontxt::clipboard::copy_to_clipboard;
use dircontxt::utils::{format_bytes, format_timestamp};
use dircontxt::{
    AppConfig, Archive, ChangeKind, DiffReport, DircontxtBuilder, OutputMode, Result,
    SnapshotOutcome,
};
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// dctx - Capture directories as LLM-ready context
#[derive(Parser)]
#[command(name = "dctx")]
#[command(version)]
#[command(about = "Snapshot a directory into a binary archive and LLM-readable text")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a snapshot of a directory
    #[command(alias = "snap")]
    Snapshot {
        /// Directory to capture
        target: PathBuf,

        /// Copy the context text to the clipboard instead of writing artifacts
        #[arg(short, long)]
        clipboard: bool,

        /// Which artifacts to keep (overrides the config file)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Extra ignore patterns (gitignore syntax)
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Capture symlink targets instead of skipping links
        #[arg(long)]
        follow_symlinks: bool,

        /// Directory for artifacts (defaults to the target's parent)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Show changes since the last snapshot
    #[command(alias = "st")]
    Status {
        /// Directory to check
        target: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the contents of an archive
    Inspect {
        /// Archive file
        archive: PathBuf,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write one archived file to stdout
    Cat {
        /// Archive file
        archive: PathBuf,

        /// Path inside the archive
        path: String,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Both,
    Text,
    Binary,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Both => OutputMode::Both,
            ModeArg::Text => OutputMode::Text,
            ModeArg::Binary => OutputMode::Binary,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Snapshot {
            target,
            clipboard,
            mode,
            ignore,
            follow_symlinks,
            output_dir,
        } => cmd_snapshot(target, clipboard, mode, ignore, follow_symlinks, output_dir),
        Commands::Status { target, json } => cmd_status(target, json),
        Commands::Inspect { archive, json } => cmd_inspect(archive, json),
        Commands::Cat { archive, path } => cmd_cat(archive, path),
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a snapshot
///
/// Writes the archive and, depending on the output mode, the context text
/// and a diff file. With `--clipboard` the context text is copied instead
/// and nothing next to the target is modified.
fn cmd_snapshot(
    target: PathBuf,
    clipboard: bool,
    mode: Option<ModeArg>,
    ignore: Vec<String>,
    follow_symlinks: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let config = AppConfig::load();
    let mut builder = DircontxtBuilder::new()
        .config(config)
        .ignore_patterns(ignore)
        .follow_symlinks(follow_symlinks || config.follow_symlinks);
    if let Some(mode) = mode {
        builder = builder.output_mode(mode.into());
    }
    if let Some(dir) = output_dir {
        builder = builder.output_dir(dir);
    }
    let dctx = builder.build(&target)?;

    println!(
        "{} {}",
        "Snapshotting".blue().bold(),
        dctx.target().display().to_string().cyan()
    );

    let start = Instant::now();
    let pb = spinner("Capturing files...");

    if clipboard {
        let result = dctx.snapshot_to_string();
        pb.finish_and_clear();
        let (text, outcome) = result?;
        copy_to_clipboard(&text)?;
        println!(
            "{} Copied snapshot {} to clipboard ({})",
            "✓".green().bold(),
            outcome.version.yellow().bold(),
            format_bytes(text.len() as u64).cyan()
        );
        print_outcome(&outcome, start.elapsed());
        return Ok(());
    }

    let result = dctx.snapshot();
    pb.finish_and_clear();
    let outcome = result?;

    println!(
        "{} Created snapshot {}",
        "✓".green().bold(),
        outcome.version.yellow().bold()
    );
    for path in [&outcome.archive, &outcome.context, &outcome.diff_file]
        .into_iter()
        .flatten()
    {
        println!("  Wrote: {}", path.display().to_string().cyan());
    }
    print_outcome(&outcome, start.elapsed());
    Ok(())
}

fn print_outcome(outcome: &SnapshotOutcome, elapsed: Duration) {
    println!("  Files: {}", outcome.write.files.to_string().cyan());
    println!("  Directories: {}", outcome.write.directories.to_string().cyan());
    println!("  Content: {}", format_bytes(outcome.write.content_bytes).cyan());
    if outcome.walk.ignored > 0 {
        println!("  Ignored: {}", outcome.walk.ignored.to_string().dimmed());
    }

    match (&outcome.previous_version, &outcome.changes) {
        (Some(from), Some(changes)) if changes.has_changes() => {
            let counts = changes.counts();
            println!(
                "  Changes since {}: {} added, {} modified, {} removed",
                from.yellow(),
                counts.added.to_string().green(),
                counts.modified.to_string().yellow(),
                counts.removed.to_string().red()
            );
        }
        (Some(from), Some(_)) => println!("  No changes since {}", from.yellow()),
        (Some(from), None) => println!(
            "  {}",
            format!("Previous snapshot {} unreadable, changes not tracked", from).yellow()
        ),
        (None, _) => {}
    }

    if !outcome.warnings.is_empty() {
        println!("\n{}", format!("{} warnings:", outcome.warnings.len()).yellow().bold());
        for warning in outcome.warnings.iter().take(10) {
            println!("  ! {}", warning);
        }
        if outcome.warnings.len() > 10 {
            println!("  ... and {} more", outcome.warnings.len() - 10);
        }
    }

    println!("  Time: {}", format_duration(elapsed).to_string().cyan());
}

/// Show changes since the last snapshot
fn cmd_status(target: PathBuf, json: bool) -> Result<()> {
    let dctx = DircontxtBuilder::new().config(AppConfig::load()).build(&target)?;
    let report = dctx.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report {
        None => println!(
            "{} No snapshot of {} yet",
            "!".yellow().bold(),
            dctx.target().display().to_string().cyan()
        ),
        Some(report) if !report.has_changes() => {
            println!("{} No changes since the last snapshot", "✓".green().bold())
        }
        Some(report) => show_changes(&report),
    }
    Ok(())
}

fn show_changes(report: &DiffReport) {
    let counts = report.counts();
    println!("{}", "Summary:".bold());
    println!("  Added: {}", counts.added.to_string().green());
    println!("  Modified: {}", counts.modified.to_string().yellow());
    println!("  Removed: {}", counts.removed.to_string().red());
    println!();

    for entry in report {
        let line = format!("[{}] {}", entry.entry_kind.tag(), entry.relative_path);
        match entry.change {
            ChangeKind::Added => println!("  + {}", line.green()),
            ChangeKind::Modified => println!("  ~ {}", line.yellow()),
            ChangeKind::Removed => println!("  - {}", line.red()),
        }
    }
}

/// List every node of an archive
fn cmd_inspect(path: PathBuf, json: bool) -> Result<()> {
    let archive = Archive::open(&path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(archive.root())?);
        return Ok(());
    }

    println!("{} {}", "Archive".blue().bold(), path.display().to_string().cyan());
    let root = archive.root();
    println!(
        "  {} files, {} directories, {} of content",
        root.file_count(),
        root.dir_count(),
        format_bytes(archive.content_len())
    );
    println!();

    for node in root.iter() {
        let shown = if node.relative_path.is_empty() {
            "."
        } else {
            node.relative_path.as_str()
        };
        let size = node
            .content_size()
            .map(format_bytes)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {:>10}  {}  {}",
            node.entry_kind().tag(),
            size,
            format_timestamp(node.modified).dimmed(),
            if node.is_dir() { shown.blue().bold() } else { shown.normal() }
        );
    }
    Ok(())
}

/// Write one archived file's bytes to stdout
fn cmd_cat(path: PathBuf, relative_path: String) -> Result<()> {
    let mut archive = Archive::open(&path)?;
    let content = archive.read_path(&relative_path)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(&content)?;
    out.flush()?;
    Ok(())
}
