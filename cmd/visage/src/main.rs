//! visage - build a face embedding forest and search it.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{BuildCommand, MatchCommand, SearchCommand};

/// visage - face search over a random projection forest.
///
/// The index lives in a directory holding two files:
///   - face.db    the forest (trees and vectors)
///   - face.json  the ordinal -> "<id>=<suffix>" label table
#[derive(Parser)]
#[command(name = "visage")]
#[command(about = "Face embedding index builder and matcher")]
#[command(version)]
pub struct Cli {
    /// Output as pretty JSON
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build an index from a JSON Lines ingest file
    Build(BuildCommand),
    /// Search the index with one embedding vector
    Search(SearchCommand),
    /// Match every .vector file given and write <name>.json next to it
    Match(MatchCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Build(cmd) => cmd.run(&cli),
        Commands::Search(cmd) => cmd.run(&cli),
        Commands::Match(cmd) => cmd.run(&cli),
    }
}
