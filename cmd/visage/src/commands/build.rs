//! Index build command.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use tracing::info;
use visage_forest::{
    DEFAULT_DIM, DEFAULT_LEAF_CAPACITY, DEFAULT_TREES, DEFAULT_TWO_MEANS_ITERATIONS,
    ForestBuilder, ForestConfig, VectorSet,
};

use crate::Cli;

/// Build face.db and face.json from (identity, suffix, vector) records.
#[derive(Args)]
pub struct BuildCommand {
    /// JSON Lines file, one {"id": ..., "suffix": ..., "vector": [...]} per line
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output directory for face.db and face.json
    #[arg(short = 'o', long, default_value = ".")]
    out: PathBuf,

    /// Expected vector dimension
    #[arg(long, default_value_t = DEFAULT_DIM)]
    dim: usize,

    /// Number of trees
    #[arg(long, env = "VISAGE_TREES", default_value_t = DEFAULT_TREES)]
    trees: usize,

    /// Maximum items per leaf
    #[arg(long, env = "VISAGE_LEAF_CAPACITY", default_value_t = DEFAULT_LEAF_CAPACITY)]
    leaf_capacity: usize,

    /// Sampling rounds per split
    #[arg(long, default_value_t = DEFAULT_TWO_MEANS_ITERATIONS)]
    two_means_iterations: usize,

    /// Base random seed
    #[arg(long, env = "VISAGE_SEED", default_value_t = 0)]
    seed: u64,
}

/// One ingest line.
#[derive(Debug, Deserialize)]
struct IngestRecord {
    id: String,
    #[serde(default)]
    suffix: String,
    vector: Vec<f32>,
}

impl BuildCommand {
    pub fn run(&self, _cli: &Cli) -> anyhow::Result<()> {
        let f = File::open(&self.input)
            .with_context(|| format!("open {}", self.input.display()))?;
        let items = read_ingest(BufReader::new(f), self.dim)?;
        info!(items = items.len(), dim = items.dim(), "ingest loaded");

        let forest = ForestBuilder::new(ForestConfig {
            trees: self.trees,
            leaf_capacity: self.leaf_capacity,
            two_means_iterations: self.two_means_iterations,
            seed: self.seed,
        })
        .build(items)?;

        forest
            .save_files(&self.out)
            .with_context(|| format!("save index to {}", self.out.display()))?;
        info!(dir = %self.out.display(), "index saved");
        Ok(())
    }
}

/// Parses ingest records into a vector set of dimension `dim`.
/// Blank lines are skipped.
fn read_ingest(r: impl BufRead, dim: usize) -> anyhow::Result<VectorSet> {
    let mut items = VectorSet::with_dim(dim);
    for (n, line) in r.lines().enumerate() {
        let line = line.with_context(|| format!("read line {}", n + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: IngestRecord =
            serde_json::from_str(&line).with_context(|| format!("parse line {}", n + 1))?;
        items
            .insert(&rec.vector, visage_forest::make_label(&rec.id, &rec.suffix))
            .with_context(|| format!("line {}: identity {}", n + 1, rec.id))?;
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records() {
        let input = concat!(
            r#"{"id": "a", "suffix": "1.jpg", "vector": [1.0, 0.0]}"#,
            "\n\n",
            r#"{"id": "b", "vector": [0.0, 1.0]}"#,
            "\n",
        );
        let items = read_ingest(input.as_bytes(), 2).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items.label(0).unwrap(), "a=1.jpg");
        assert_eq!(items.label(1).unwrap(), "b");
    }

    #[test]
    fn rejects_wrong_dimension() {
        let input = r#"{"id": "a", "vector": [1.0, 0.0, 0.0]}"#;
        let err = read_ingest(input.as_bytes(), 2).unwrap_err();
        assert!(format!("{err:#}").contains("line 1"));
    }

    #[test]
    fn rejects_bad_json() {
        assert!(read_ingest("not json".as_bytes(), 2).is_err());
    }
}
