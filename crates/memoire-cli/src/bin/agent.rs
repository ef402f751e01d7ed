//! memoire-agent — the Coherence Agent's CLI entry point. Runs one pass of
//! Mnémosyne (rectification, reflection, or both) over a single freshly
//! indexed source file and prints a summary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use memoire_core::coherence::CoherenceMode;
use memoire_core::{Mnemosyne, Sbire, Store};

/// Mémoire Coherence Agent ("Mnémosyne")
#[derive(Parser)]
#[command(name = "memoire-agent")]
#[command(author = "Sam Valladares")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Runs a coherence pass (rectification/reflection) over a freshly indexed file")]
struct Cli {
    /// Path to the just-indexed source file, relative to --data-dir
    #[arg(long)]
    file: PathBuf,

    /// Which phase(s) to run
    #[arg(long, value_enum, default_value = "complet")]
    mode: Mode,

    /// Don't write anything; report what would have happened
    #[arg(long)]
    dry_run: bool,

    /// Cap on the per-correction mandate-escalation loop
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Print per-phase detail instead of just the final summary
    #[arg(long)]
    verbose: bool,

    /// Directory holding memoire.db and fragments/ (defaults to the platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Mode {
    Rectification,
    Reflexion,
    Complet,
}

impl From<Mode> for CoherenceMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Rectification => CoherenceMode::Rectification,
            Mode::Reflexion => CoherenceMode::Reflexion,
            Mode::Complet => CoherenceMode::Complet,
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "memoire", "core")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    println!("{}", "=== Mémoire Coherence Agent ===".cyan().bold());
    println!();

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let db_path = data_dir.join("memoire.db");
    let fragments_root = data_dir.join("fragments");
    let notes_path = data_dir.join("config").join("mnemosyne_notes.md");

    let source_path = data_dir.join(&cli.file);
    let content = std::fs::read_to_string(&source_path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", source_path.display()))?;

    if cli.dry_run {
        println!("{}", "Dry run: no writes will be committed.".yellow());
    }
    println!("{}: {}", "File".white().bold(), cli.file.display());
    println!("{}: {}", "Mode".white().bold(), mode_label(cli.mode));
    println!();

    let store = Arc::new(Store::open(Some(db_path))?);
    let sbire = Sbire::new(store, fragments_root);
    let mut mnemosyne = Mnemosyne::new(sbire, notes_path, cli.dry_run);
    if let Some(max_iterations) = cli.max_iterations {
        mnemosyne = mnemosyne.with_max_iterations(max_iterations);
    }

    let result = mnemosyne.run(&content, &[], cli.mode.into()).await;

    if cli.verbose {
        println!("{}", "Phase A — Rectification".yellow().bold());
        println!("  {}: {}", "Corrections detected".white(), result.corrections_detected);
        println!("  {}: {}", "Segments rectified".white(), result.segments_rectified);
        println!();
        println!("{}", "Phase B — Reflection".yellow().bold());
        println!("  {}: {}", "Piliers proposed".white(), result.piliers_proposes);
        println!("  {}: {}", "Links created".white(), result.liens_crees);
        println!();
    }

    println!("{}: {}", "Corrections detected".white().bold(), result.corrections_detected);
    println!("{}: {}", "Segments rectified".white().bold(), result.segments_rectified);
    println!("{}: {}", "Links created".white().bold(), result.liens_crees);
    println!("{}: {}", "Piliers proposed".white().bold(), result.piliers_proposes);

    if result.erreurs.is_empty() {
        println!();
        println!("{}", "Coherence pass complete, no errors.".green().bold());
    } else {
        println!();
        println!("{}", format!("Coherence pass complete with {} error(s):", result.erreurs.len()).red().bold());
        for err in &result.erreurs {
            println!("  {} {}", "!".red().bold(), err);
        }
    }

    Ok(())
}

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Rectification => "rectification",
        Mode::Reflexion => "reflexion",
        Mode::Complet => "complet",
    }
}
