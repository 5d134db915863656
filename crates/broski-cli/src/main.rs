//! # broski CLI entry point
//!
//! Operator tooling for the engagement backend. Validates and prints
//! challenge catalogs before they are deployed, and prints the XP level
//! table and per-tier usage limits.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use broski_engagement::usage::daily_limit;
use broski_engagement::{ChallengeCatalog, Level, SubscriptionTier, XP_PER_LEVEL};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Broski backend operator CLI.
#[derive(Parser, Debug)]
#[command(name = "broski", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Challenge catalog operations.
    #[command(subcommand)]
    Catalog(CatalogCommand),

    /// Print the XP level table.
    Levels(LevelsArgs),

    /// Print the daily analysis limit of every subscription tier.
    Limits,
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Check a YAML catalog: unique ids, non-empty prompts.
    Validate {
        /// Path to the catalog file.
        path: PathBuf,
    },
    /// Print a catalog as JSON. Without a path, prints the built-in catalog.
    Show {
        /// Path to the catalog file.
        path: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct LevelsArgs {
    /// Highest level to print.
    #[arg(long, default_value_t = 30)]
    max_level: u32,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Catalog(cmd) => run_catalog(cmd),
        Commands::Levels(args) => run_levels(&args),
        Commands::Limits => run_limits(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn run_catalog(cmd: CatalogCommand) -> anyhow::Result<()> {
    match cmd {
        CatalogCommand::Validate { path } => {
            let catalog = ChallengeCatalog::load(&path)
                .with_context(|| format!("catalog {} is invalid", path.display()))?;
            println!(
                "OK: {} (version {}, {} challenges)",
                path.display(),
                catalog.version(),
                catalog.len()
            );
            Ok(())
        }
        CatalogCommand::Show { path } => {
            let catalog = match path {
                Some(path) => ChallengeCatalog::load(&path)
                    .with_context(|| format!("loading catalog {}", path.display()))?,
                None => ChallengeCatalog::builtin(),
            };
            println!("{}", catalog_json(&catalog)?);
            Ok(())
        }
    }
}

fn catalog_json(catalog: &ChallengeCatalog) -> anyhow::Result<String> {
    let doc = serde_json::json!({
        "version": catalog.version(),
        "challenges": catalog.entries(),
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}

fn level_rows(max_level: u32) -> Vec<(u32, u32, &'static str)> {
    (1..=max_level)
        .map(|n| {
            let level = Level::from_xp((n - 1).saturating_mul(XP_PER_LEVEL));
            (level.number, level.min_xp(), level.name.as_str())
        })
        .collect()
}

fn run_levels(args: &LevelsArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.max_level > 0, "--max-level must be at least 1");
    println!("{:>5}  {:>7}  name", "level", "min_xp");
    for (number, min_xp, name) in level_rows(args.max_level) {
        println!("{number:>5}  {min_xp:>7}  {name}");
    }
    Ok(())
}

fn run_limits() -> anyhow::Result<()> {
    for tier in [
        SubscriptionTier::Free,
        SubscriptionTier::Pro,
        SubscriptionTier::Elite,
    ] {
        println!("{:<6} {}", tier.as_str(), daily_limit(tier));
    }
    Ok(())
}
