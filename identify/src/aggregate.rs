use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use visage_forest::{Candidate, VectorSet, identity_of};

use crate::MatchError;
use crate::metadata::{MetadataStore, NoMetadata, Performer};

/// Distance subtracted for every additional hit on the same identity.
pub const REPEAT_HIT_BONUS: f32 = 0.5;

/// Decimal places kept from the first hit's distance.
pub const DISTANCE_PRECISION: u32 = 2;

/// Result fields a performer's extra attributes may not override.
const RESULT_FIELDS: [&str; 3] = ["id", "distance", "hits"];

/// Controls how hits are collapsed into identities.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Subtracted from an identity's distance per repeat hit. Default: 0.5.
    pub repeat_bonus: f32,

    /// Decimal places the first hit's distance is rounded to. Default: 2.
    pub precision: u32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            repeat_bonus: REPEAT_HIT_BONUS,
            precision: DISTANCE_PRECISION,
        }
    }
}

/// One identity in a ranked result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub id: String,

    /// Rounded distance of the closest hit, minus the repeat bonus for every
    /// further hit. Lower is better; may go negative.
    pub distance: f32,

    /// Number of reference vectors of this identity among the candidates.
    pub hits: usize,

    #[serde(flatten)]
    pub performer: Performer,
}

/// Collapses raw forest hits into a ranked, deduplicated identity list.
pub struct IdentityAggregator {
    cfg: AggregatorConfig,
    metadata: Arc<dyn MetadataStore>,
}

impl IdentityAggregator {
    pub fn new(cfg: AggregatorConfig, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { cfg, metadata }
    }

    /// Aggregator with default settings and no metadata.
    pub fn without_metadata() -> Self {
        Self::new(AggregatorConfig::default(), Arc::new(NoMetadata))
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.cfg
    }

    /// Rank the identities behind `candidates`.
    ///
    /// `candidates` must be ordered by ascending distance, as returned by
    /// [`visage_forest::ForestIndex::query`]; `items` resolves their labels.
    /// Results at or beyond `distance_threshold` are dropped, and at most
    /// `result_limit` are returned. Equal distances keep first-seen order.
    pub fn aggregate(
        &self,
        items: &VectorSet,
        candidates: &[Candidate],
        result_limit: usize,
        distance_threshold: Option<f32>,
    ) -> Result<Vec<AggregatedResult>, MatchError> {
        let mut results: Vec<AggregatedResult> = Vec::new();
        let mut by_id: HashMap<&str, usize> = HashMap::new();

        for c in candidates {
            let label = items.label(c.ordinal as usize).inspect_err(|e| {
                error!(ordinal = c.ordinal, error = %e, "identify: candidate without label");
            })?;
            let id = identity_of(label);

            if let Some(&slot) = by_id.get(id) {
                let r = &mut results[slot];
                r.hits += 1;
                r.distance -= self.cfg.repeat_bonus;
                continue;
            }

            by_id.insert(id, results.len());
            results.push(AggregatedResult {
                id: id.to_string(),
                distance: self.round(c.distance),
                hits: 1,
                performer: self.performer(id),
            });
        }

        // Stable: ties keep first-seen order.
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        if let Some(threshold) = distance_threshold {
            results.retain(|r| r.distance < threshold);
        }
        results.truncate(result_limit);
        Ok(results)
    }

    fn performer(&self, id: &str) -> Performer {
        let mut performer = self.metadata.get(id).unwrap_or_default();
        performer
            .extra
            .retain(|key, _| !RESULT_FIELDS.contains(&key.as_str()));
        performer
    }

    fn round(&self, distance: f32) -> f32 {
        let scale = 10f64.powi(self.cfg.precision as i32);
        ((distance as f64 * scale).round() / scale) as f32
    }
}
