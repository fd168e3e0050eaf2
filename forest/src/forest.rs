use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::ForestError;
use crate::tree::{Tree, TreeBuilder};
use crate::vectors::VectorSet;

/// Default embedding dimension (FaceNet-512).
pub const DEFAULT_DIM: usize = 512;
/// Default number of trees in a forest.
pub const DEFAULT_TREES: usize = 100;
/// Default maximum number of items in a leaf.
pub const DEFAULT_LEAF_CAPACITY: usize = 64;
/// Default number of sampling rounds when choosing a split.
pub const DEFAULT_TWO_MEANS_ITERATIONS: usize = 200;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// ForestConfig configures a forest build.
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Number of independent trees. Default: 100.
    pub trees: usize,
    /// Maximum items per leaf. Default: 64.
    pub leaf_capacity: usize,
    /// Sampling rounds of the two-means split heuristic. Default: 200.
    pub two_means_iterations: usize,
    /// Base seed; each tree derives its own stream from it.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: DEFAULT_TREES,
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
            two_means_iterations: DEFAULT_TWO_MEANS_ITERATIONS,
            seed: 0,
        }
    }
}

impl ForestConfig {
    pub(crate) fn set_defaults(&mut self) {
        if self.trees == 0 {
            self.trees = DEFAULT_TREES;
        }
        if self.leaf_capacity == 0 {
            self.leaf_capacity = DEFAULT_LEAF_CAPACITY;
        }
        // Item ordinals are u32, so larger capacities behave the same.
        self.leaf_capacity = self.leaf_capacity.min(u32::MAX as usize);
        if self.two_means_iterations == 0 {
            self.two_means_iterations = DEFAULT_TWO_MEANS_ITERATIONS;
        }
    }
}

/// Seed of the `tree`-th stream (SplitMix64 over the base seed).
pub(crate) fn tree_seed(seed: u64, tree: u64) -> u64 {
    let mut z = seed.wrapping_add((tree + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ---------------------------------------------------------------------------
// Forest
// ---------------------------------------------------------------------------

/// Forest is an ensemble of random projection trees over one [VectorSet].
///
/// A forest is immutable once built or loaded and can be shared across
/// threads freely.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    pub(crate) items: VectorSet,
    pub(crate) trees: Vec<Tree>,
    pub(crate) leaf_capacity: usize,
}

impl Forest {
    pub(crate) fn from_parts(items: VectorSet, trees: Vec<Tree>, leaf_capacity: usize) -> Self {
        Self {
            items,
            trees,
            leaf_capacity,
        }
    }

    /// The indexed items.
    pub fn items(&self) -> &VectorSet {
        &self.items
    }

    /// The trees in build order.
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    /// Vector dimension of the indexed items.
    pub fn dim(&self) -> usize {
        self.items.dim()
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// ForestBuilder builds a [Forest] with trees constructed in parallel.
pub struct ForestBuilder {
    cfg: ForestConfig,
}

impl ForestBuilder {
    pub fn new(mut cfg: ForestConfig) -> Self {
        cfg.set_defaults();
        Self { cfg }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.cfg
    }

    /// Build all trees over `items`. Fails as a whole if any tree fails.
    pub fn build(&self, items: VectorSet) -> Result<Forest, ForestError> {
        let start = Instant::now();
        let cfg = &self.cfg;

        let trees = (0..cfg.trees)
            .into_par_iter()
            .map(|t| -> Result<Tree, ForestError> {
                let tree = TreeBuilder::new(
                    &items,
                    cfg.leaf_capacity,
                    cfg.two_means_iterations,
                    tree_seed(cfg.seed, t as u64),
                )
                .build()?;
                debug!(tree = t, nodes = tree.node_count(), "forest: tree built");
                Ok(tree)
            })
            .collect::<Result<Vec<Tree>, ForestError>>()?;

        info!(
            items = items.len(),
            dim = items.dim(),
            trees = trees.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "forest: build complete"
        );
        Ok(Forest::from_parts(items, trees, cfg.leaf_capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_set(n: usize) -> VectorSet {
        let mut set = VectorSet::new();
        for i in 0..n {
            set.insert(&[i as f32, (i * i % 7) as f32], format!("id{}={i}", i % 5))
                .unwrap();
        }
        set
    }

    #[test]
    fn zero_config_gets_defaults() {
        let b = ForestBuilder::new(ForestConfig {
            trees: 0,
            leaf_capacity: 0,
            two_means_iterations: 0,
            seed: 0,
        });
        assert_eq!(b.config().trees, DEFAULT_TREES);
        assert_eq!(b.config().leaf_capacity, DEFAULT_LEAF_CAPACITY);
        assert_eq!(b.config().two_means_iterations, DEFAULT_TWO_MEANS_ITERATIONS);
    }

    #[test]
    fn builds_requested_tree_count() {
        let forest = ForestBuilder::new(ForestConfig {
            trees: 7,
            leaf_capacity: 4,
            ..Default::default()
        })
        .build(line_set(50))
        .unwrap();
        assert_eq!(forest.tree_count(), 7);
        assert_eq!(forest.len(), 50);
        assert_eq!(forest.dim(), 2);
        assert_eq!(forest.leaf_capacity(), 4);
    }

    #[test]
    fn builds_are_deterministic() {
        let cfg = ForestConfig {
            trees: 6,
            leaf_capacity: 3,
            seed: 99,
            ..Default::default()
        };
        let a = ForestBuilder::new(cfg.clone()).build(line_set(60)).unwrap();
        let b = ForestBuilder::new(cfg).build(line_set(60)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn trees_are_diverse() {
        let forest = ForestBuilder::new(ForestConfig {
            trees: 4,
            leaf_capacity: 3,
            ..Default::default()
        })
        .build(line_set(60))
        .unwrap();
        assert_ne!(forest.trees()[0], forest.trees()[1]);
    }

    #[test]
    fn tree_seeds_are_distinct() {
        let seeds: std::collections::HashSet<u64> = (0..1000).map(|t| tree_seed(5, t)).collect();
        assert_eq!(seeds.len(), 1000);
        assert_ne!(tree_seed(1, 0), tree_seed(2, 0));
    }

    #[test]
    fn empty_set_builds() {
        let forest = ForestBuilder::new(ForestConfig {
            trees: 3,
            ..Default::default()
        })
        .build(VectorSet::new())
        .unwrap();
        assert_eq!(forest.tree_count(), 3);
        assert!(forest.is_empty());
    }
}
