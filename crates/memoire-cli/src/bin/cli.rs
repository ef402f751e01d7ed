//! memoire — ad hoc CLI for searching and inspecting the memory store
//! without going through an MCP client.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use memoire_core::query_profile::QueryProfile;
use memoire_core::{Hermes, Store};

/// Mémoire - Conversational Memory CLI
#[derive(Parser)]
#[command(name = "memoire")]
#[command(author = "Sam Valladares")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search and inspect the memoire conversational-memory store")]
struct Cli {
    /// Directory holding memoire.db and fragments/ (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hybrid search over indexed segments
    Search {
        /// Free-text query
        query: String,
        /// Maximum candidates to return
        #[arg(long, default_value = "10")]
        top_k: usize,
        /// Restrict to the last N days
        #[arg(long)]
        days: Option<i64>,
    },

    /// Show coarse store counts
    Inspect,

    /// List the graph edges touching a segment
    Links {
        /// Segment id
        segment_id: i64,
    },
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "memoire", "core")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let db_path = data_dir.join("memoire.db");
    let fragments_root = data_dir.join("fragments");

    match cli.command {
        Commands::Search { query, top_k, days } => run_search(db_path, fragments_root, query, top_k, days),
        Commands::Inspect => run_inspect(db_path),
        Commands::Links { segment_id } => run_links(db_path, segment_id),
    }
}

fn run_search(db_path: PathBuf, fragments_root: PathBuf, query: String, top_k: usize, days: Option<i64>) -> anyhow::Result<()> {
    println!("{}", "=== Mémoire Search ===".cyan().bold());
    println!();

    let store = Arc::new(Store::open(Some(db_path))?);
    let hermes = Hermes::new(store, fragments_root);

    let mut profile = QueryProfile::default();
    profile.strategy.top_k = top_k;
    profile.filters.date_range_days = days;

    let result = hermes.run(&query, &profile)?;

    if result.used_fallback {
        println!("{}", "No metadata matches — falling back to raw-text search.".yellow());
        println!();
    }

    if result.candidates.is_empty() && result.fallback_hits.is_empty() {
        println!("{}", "No results.".dimmed());
        return Ok(());
    }

    for candidate in &result.candidates {
        println!(
            "{} {} {}",
            format!("[{:.3}]", candidate.score).green().bold(),
            format!("#{}", candidate.segment.id).dimmed(),
            candidate.segment.resume_texte
        );
        if !candidate.segment.personnes.is_empty() {
            println!("    {} {}", "personnes:".white(), candidate.segment.personnes.join(", "));
        }
        if !candidate.segment.sujets.is_empty() {
            println!("    {} {}", "sujets:".white(), candidate.segment.sujets.join(", "));
        }
    }

    for hit in &result.fallback_hits {
        println!("{} {}", "[fallback]".yellow(), hit.content);
    }

    Ok(())
}

fn run_inspect(db_path: PathBuf) -> anyhow::Result<()> {
    println!("{}", "=== Mémoire Inspect ===".cyan().bold());
    println!();

    let store = Store::open(Some(db_path))?;
    let stats = store.stats()?;

    println!("{}: {}", "Segments".white().bold(), stats.segments);
    println!("{}: {}", "Edges".white().bold(), stats.edges);
    println!("{}: {}", "Piliers".white().bold(), stats.piliers);
    println!("{}: {}", "Validated".white().bold(), stats.validated);
    println!("{}: {}", "Refuted".white().bold(), stats.refuted);

    Ok(())
}

fn run_links(db_path: PathBuf, segment_id: i64) -> anyhow::Result<()> {
    println!("{}", "=== Mémoire Links ===".cyan().bold());
    println!();

    let store = Store::open(Some(db_path))?;
    let edges = store.edges_for_segment(segment_id)?;

    if edges.is_empty() {
        println!("{}", "No edges found.".dimmed());
        return Ok(());
    }

    for edge in &edges {
        println!(
            "{} {} -> {} {}",
            format!("#{}", edge.id).dimmed(),
            edge.source_id,
            edge.target_id,
            format!("({}, w={:.2})", edge.edge_type, edge.weight).white()
        );
    }

    Ok(())
}
