//! Utility functions for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use visage_forest::DEFAULT_SEARCH_BUDGET;
use visage_identify::{
    DEFAULT_CANDIDATES, Matcher, MatcherConfig, MemoryMetadata, MetadataStore, NoMetadata,
};

/// Index location and query tuning shared by `search` and `match`.
#[derive(Args)]
pub struct IndexArgs {
    /// Directory holding face.db and face.json
    #[arg(long, env = "VISAGE_INDEX_DIR", default_value = ".")]
    pub index: PathBuf,

    /// Optional performers.json with names and images per identity
    #[arg(long)]
    pub performers: Option<PathBuf>,

    /// Raw neighbors fetched per query
    #[arg(long, default_value_t = DEFAULT_CANDIDATES)]
    pub candidates: usize,

    /// Unique items the forest may examine per query
    #[arg(long, env = "VISAGE_SEARCH_BUDGET", default_value_t = DEFAULT_SEARCH_BUDGET)]
    pub search_budget: usize,
}

/// Loads the index and optional metadata into a ready matcher.
pub fn load_matcher(args: &IndexArgs) -> anyhow::Result<Matcher> {
    let metadata: Arc<dyn MetadataStore> = match &args.performers {
        Some(path) => Arc::new(
            MemoryMetadata::from_file(path)
                .with_context(|| format!("load performers from {}", path.display()))?,
        ),
        None => Arc::new(NoMetadata),
    };

    let matcher = Matcher::new(
        MatcherConfig {
            candidates: args.candidates,
            search_budget: args.search_budget,
            ..Default::default()
        },
        metadata,
    );
    matcher
        .load_files(&args.index)
        .with_context(|| format!("load index from {}", args.index.display()))?;
    Ok(matcher)
}

/// Reads a JSON array of floats.
pub fn read_vector(path: &Path) -> anyhow::Result<Vec<f32>> {
    let content =
        std::fs::read(path).with_context(|| format!("read vector {}", path.display()))?;
    let vector: Vec<f32> = serde_json::from_slice(&content)
        .with_context(|| format!("parse vector {}", path.display()))?;
    Ok(vector)
}

/// Serializes a result as compact or pretty JSON.
pub fn to_json<T: serde::Serialize>(result: &T, pretty: bool) -> anyhow::Result<String> {
    let output = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    Ok(output)
}
