//! Batch match command: one result file per .vector file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tracing::{info, warn};
use visage_identify::{DEFAULT_RESULT_LIMIT, DEFAULT_THRESHOLD, Matcher};

use super::{IndexArgs, load_matcher, read_vector, to_json};
use crate::Cli;

/// Match each <name>.vector file and write the ranking to <name>.json.
#[derive(Args)]
pub struct MatchCommand {
    #[command(flatten)]
    index: IndexArgs,

    /// Vector files to match
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Maximum number of identities per file
    #[arg(long, default_value_t = DEFAULT_RESULT_LIMIT)]
    results: usize,

    /// Maximum adjusted distance (lower is better)
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f32,

    /// Overwrite existing result files
    #[arg(long)]
    force: bool,
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Written(PathBuf),
    Skipped(PathBuf),
}

impl MatchCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let matcher = load_matcher(&self.index)?;

        let (mut written, mut skipped, mut failed) = (0usize, 0usize, 0usize);
        for file in &self.files {
            match self.process(&matcher, file, cli.pretty) {
                Ok(Outcome::Written(_)) => written += 1,
                Ok(Outcome::Skipped(out)) => {
                    info!("{} already exists, skipping", out.display());
                    skipped += 1;
                }
                Err(e) => {
                    warn!("{}: {e:#}", file.display());
                    failed += 1;
                }
            }
        }

        info!(written, skipped, failed, "match done");
        if failed > 0 && written == 0 && skipped == 0 {
            anyhow::bail!("all {failed} vector files failed");
        }
        Ok(())
    }

    fn process(&self, matcher: &Matcher, file: &Path, pretty: bool) -> anyhow::Result<Outcome> {
        let out = file.with_extension("json");
        if out.exists() && !self.force {
            return Ok(Outcome::Skipped(out));
        }

        let vector = read_vector(file)?;
        let results = matcher.search(&vector, self.results, Some(self.threshold))?;
        match results.first() {
            Some(best) => info!(
                file = %file.display(),
                id = %best.id,
                distance = best.distance,
                hits = best.hits,
                "closest match"
            ),
            None => info!(file = %file.display(), "no match within threshold"),
        }

        std::fs::write(&out, to_json(&results, pretty)?)
            .with_context(|| format!("write {}", out.display()))?;
        Ok(Outcome::Written(out))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use visage_forest::{ForestBuilder, ForestConfig, VectorSet};
    use visage_identify::{MatcherConfig, NoMetadata};

    fn command(files: Vec<PathBuf>, force: bool) -> MatchCommand {
        MatchCommand {
            index: IndexArgs {
                index: PathBuf::from("."),
                performers: None,
                candidates: 50,
                search_budget: 1000,
            },
            files,
            results: 10,
            threshold: 20.0,
            force,
        }
    }

    fn matcher() -> Matcher {
        let items = VectorSet::from_triples(vec![
            ("a", "1", vec![1.0, 0.0]),
            ("b", "1", vec![0.0, 1.0]),
        ])
        .unwrap();
        let m = Matcher::new(MatcherConfig::default(), Arc::new(NoMetadata));
        m.load(ForestBuilder::new(ForestConfig::default()).build(items).unwrap())
            .unwrap();
        m
    }

    #[test]
    fn writes_results_next_to_vector() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("face1.vector");
        std::fs::write(&file, "[0.9, 0.1]").unwrap();

        let cmd = command(vec![file.clone()], false);
        let outcome = cmd.process(&matcher(), &file, false).unwrap();
        let out = dir.path().join("face1.json");
        assert_eq!(outcome, Outcome::Written(out.clone()));

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(written[0]["id"], "a");
        assert_eq!(written[0]["name"], "N/A");
    }

    #[test]
    fn skips_existing_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("face2.vector");
        std::fs::write(&file, "[0.0, 1.0]").unwrap();
        std::fs::write(dir.path().join("face2.json"), "[]").unwrap();

        let m = matcher();
        let skipped = command(vec![file.clone()], false).process(&m, &file, false).unwrap();
        assert!(matches!(skipped, Outcome::Skipped(_)));

        let forced = command(vec![file.clone()], true).process(&m, &file, false).unwrap();
        assert!(matches!(forced, Outcome::Written(_)));
    }

    #[test]
    fn bad_vector_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.vector");
        std::fs::write(&file, "[1.0, 2.0, 3.0]").unwrap();
        assert!(command(vec![file.clone()], false).process(&matcher(), &file, false).is_err());
    }
}
