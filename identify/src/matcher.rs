use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use visage_forest::{DEFAULT_SEARCH_BUDGET, Forest, ForestIndex};

use crate::MatchError;
use crate::aggregate::{AggregatedResult, AggregatorConfig, IdentityAggregator};
use crate::metadata::MetadataStore;

/// Default number of raw neighbors fetched per search.
pub const DEFAULT_CANDIDATES: usize = 50;
/// Default number of identities returned.
pub const DEFAULT_RESULT_LIMIT: usize = 10;
/// Default maximum adjusted distance of a returned identity.
pub const DEFAULT_THRESHOLD: f32 = 20.0;

/// Controls a [Matcher].
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Raw neighbors fetched from the forest per search. Default: 50.
    pub candidates: usize,

    /// Unique items the forest traversal may collect. Default: 10000.
    pub search_budget: usize,

    /// Result limit used by [`Matcher::search_default`]. Default: 10.
    pub default_limit: usize,

    /// Threshold used by [`Matcher::search_default`]. Default: 20.0.
    pub default_threshold: f32,

    pub aggregator: AggregatorConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES,
            search_budget: DEFAULT_SEARCH_BUDGET,
            default_limit: DEFAULT_RESULT_LIMIT,
            default_threshold: DEFAULT_THRESHOLD,
            aggregator: AggregatorConfig::default(),
        }
    }
}

impl MatcherConfig {
    fn with_defaults(mut self) -> Self {
        if self.candidates == 0 {
            self.candidates = DEFAULT_CANDIDATES;
        }
        if self.search_budget == 0 {
            self.search_budget = DEFAULT_SEARCH_BUDGET;
        }
        if self.default_limit == 0 {
            self.default_limit = DEFAULT_RESULT_LIMIT;
        }
        if self.default_threshold == 0.0 {
            self.default_threshold = DEFAULT_THRESHOLD;
        }
        self
    }
}

/// Response body of a search: a fresh request ID plus the ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub id: String,
    pub performers: Vec<AggregatedResult>,
}

/// Resolves face embeddings to ranked identities.
///
/// A matcher starts unloaded and serves [`MatchError::IndexNotLoaded`] until
/// [`Matcher::load`] installs a complete forest. The index can be installed
/// once; after that every method takes `&self` without locking, so a matcher
/// can be shared by any number of threads.
pub struct Matcher {
    cfg: MatcherConfig,
    aggregator: IdentityAggregator,
    index: OnceCell<ForestIndex>,
}

impl Matcher {
    pub fn new(cfg: MatcherConfig, metadata: Arc<dyn MetadataStore>) -> Self {
        let cfg = cfg.with_defaults();
        let aggregator = IdentityAggregator::new(cfg.aggregator.clone(), metadata);
        Self {
            cfg,
            aggregator,
            index: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.cfg
    }

    /// Install a fully loaded forest. Fails if one is already installed.
    pub fn load(&self, forest: Forest) -> Result<(), MatchError> {
        let (items, trees, dim) = (forest.len(), forest.tree_count(), forest.dim());
        let index = ForestIndex::new(forest).with_search_budget(self.cfg.search_budget);
        self.index
            .set(index)
            .map_err(|_| MatchError::AlreadyLoaded)?;
        info!(items, trees, dim, "identify: index ready");
        Ok(())
    }

    /// Load `face.db` and `face.json` from `dir` and install them.
    pub fn load_files(&self, dir: &Path) -> Result<(), MatchError> {
        if self.is_ready() {
            return Err(MatchError::AlreadyLoaded);
        }
        self.load(Forest::load_files(dir)?)
    }

    pub fn is_ready(&self) -> bool {
        self.index.get().is_some()
    }

    /// Number of indexed reference vectors (0 before load).
    pub fn len(&self) -> usize {
        self.index.get().map_or(0, |idx| idx.forest().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector dimension of the loaded index (0 before load).
    pub fn dim(&self) -> usize {
        self.index.get().map_or(0, |idx| idx.forest().dim())
    }

    /// Rank the identities closest to `vector`.
    ///
    /// Identities whose adjusted distance is at or above
    /// `distance_threshold` are dropped; at most `result_limit` are returned.
    pub fn search(
        &self,
        vector: &[f32],
        result_limit: usize,
        distance_threshold: Option<f32>,
    ) -> Result<Vec<AggregatedResult>, MatchError> {
        let index = self.index.get().ok_or(MatchError::IndexNotLoaded)?;
        let candidates = index.query(vector, self.cfg.candidates, self.cfg.search_budget)?;
        debug!(candidates = candidates.len(), "identify: forest query done");
        self.aggregator.aggregate(
            index.forest().items(),
            &candidates,
            result_limit,
            distance_threshold,
        )
    }

    /// [`Matcher::search`] with the configured default limit and threshold.
    pub fn search_default(&self, vector: &[f32]) -> Result<Vec<AggregatedResult>, MatchError> {
        self.search(
            vector,
            self.cfg.default_limit,
            Some(self.cfg.default_threshold),
        )
    }

    /// [`Matcher::search`] wrapped in a [SearchResponse] with a new request ID.
    pub fn search_with_id(
        &self,
        vector: &[f32],
        result_limit: usize,
        distance_threshold: Option<f32>,
    ) -> Result<SearchResponse, MatchError> {
        let performers = self.search(vector, result_limit, distance_threshold)?;
        Ok(SearchResponse {
            id: uuid::Uuid::new_v4().to_string(),
            performers,
        })
    }
}
