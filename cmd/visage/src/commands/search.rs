//! Single-vector search command.

use std::path::PathBuf;

use clap::Args;
use visage_identify::{DEFAULT_RESULT_LIMIT, DEFAULT_THRESHOLD};

use super::{IndexArgs, load_matcher, read_vector, to_json};
use crate::Cli;

/// Search the index with one embedding vector.
#[derive(Args)]
pub struct SearchCommand {
    #[command(flatten)]
    index: IndexArgs,

    /// JSON file holding the query vector
    #[arg(long)]
    vector: PathBuf,

    /// Maximum number of identities returned
    #[arg(long, default_value_t = DEFAULT_RESULT_LIMIT)]
    results: usize,

    /// Maximum adjusted distance (lower is better)
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f32,
}

impl SearchCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let matcher = load_matcher(&self.index)?;
        let vector = read_vector(&self.vector)?;
        let response = matcher.search_with_id(&vector, self.results, Some(self.threshold))?;
        println!("{}", to_json(&response, cli.pretty)?);
        Ok(())
    }
}
