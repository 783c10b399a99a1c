//! Inspect settings search rankings offline.
//!
//! Usage:
//!     prefsearch search settings.json "subtitle" --limit 10
//!     prefsearch tree settings.json "bitrate" --json
//!
//! The manifest is a JSON list of `{ "key", "title", "tree" | "path" }`
//! categories. Set RUST_LOG=debug to see index build details.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use prefsearch::{load_manifest, CategoryResults, SearchConfig, SearchMatch, SettingsSearch};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ranked flat matches
    Search {
        /// Category manifest
        manifest: PathBuf,
        query: String,

        /// Keep only the best N matches
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Matches grouped by category with their enclosing groups
    Tree {
        /// Category manifest
        manifest: PathBuf,
        query: String,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Search {
            manifest,
            query,
            limit,
            json,
        } => {
            let config = SearchConfig {
                max_results: limit,
                ..SearchConfig::default()
            };
            let engine = open(&manifest, config).await?;
            let matches = engine.search_async(query).await.context("Search failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                print_matches(&matches);
            }
        }
        Command::Tree { manifest, query, json } => {
            let engine = open(&manifest, SearchConfig::default()).await?;
            let results = engine.search_hierarchical(&query).context("Search failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_tree(&results);
            }
        }
    }

    Ok(())
}

async fn open(manifest: &Path, config: SearchConfig) -> Result<SettingsSearch> {
    let categories = load_manifest(manifest).with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
    if categories.is_empty() {
        bail!("Manifest {} lists no categories", manifest.display());
    }

    let engine = SettingsSearch::new(config);
    let report = engine.rebuild(categories).await.context("Failed to build index")?;
    if report.entries == 0 {
        bail!("No settings could be indexed from {}", manifest.display());
    }
    Ok(engine)
}

fn print_matches(matches: &[SearchMatch]) {
    if matches.is_empty() {
        println!("No matches.");
        return;
    }
    for m in matches {
        let fields: Vec<String> = m.matched_fields.iter().map(|f| format!("{:?}", f)).collect();
        println!(
            "{:>8.2}  {} > {}  [{}]  {}",
            m.score,
            m.entry.category_title,
            m.entry.title,
            m.entry.key,
            fields.join(",")
        );
    }
}

fn print_tree(results: &[CategoryResults]) {
    if results.is_empty() {
        println!("No matches.");
        return;
    }
    for category in results {
        println!("{}", category.category_title);
        for result in &category.results {
            let indent = "  ".repeat(result.entry.depth + 1);
            let marker = if result.is_parent { "+" } else { "-" };
            let score = result.score.map(|s| format!("  ({:.2})", s)).unwrap_or_default();
            println!("{}{} {}{}", indent, marker, result.entry.title, score);
        }
    }
}
