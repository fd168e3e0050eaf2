//! Approximate nearest-neighbor search with a forest of random projection
//! trees.
//!
//! # Usage
//!
//! ```
//! use visage_forest::{ForestBuilder, ForestConfig, ForestIndex, VectorSet};
//!
//! let mut items = VectorSet::new();
//! items.insert(&[1.0, 0.0, 0.0], "alice=1").unwrap();
//! items.insert(&[0.0, 1.0, 0.0], "bob=1").unwrap();
//!
//! let forest = ForestBuilder::new(ForestConfig { trees: 10, ..Default::default() })
//!     .build(items)
//!     .unwrap();
//! let index = ForestIndex::new(forest);
//!
//! let hits = index.query(&[0.9, 0.1, 0.0], 1, 0).unwrap();
//! assert_eq!(hits[0].ordinal, 0);
//! ```
//!
//! # Design
//!
//! Each tree splits its item subset by a hyperplane halfway between two
//! centroids picked by a short two-means pass, until subsets fit in a leaf.
//! Every tree draws from its own seeded random stream, so builds are
//! reproducible and trees can be built in parallel.
//!
//! A query walks all trees best-first from one shared priority queue, keyed
//! by distance to the hyperplanes it declined to cross, and stops once the
//! search budget of unique items is collected. Candidates are then ranked by
//! exact Euclidean distance.

pub mod distance;
pub mod error;
pub mod forest;
pub mod forest_io;
pub mod index;
pub mod label;
pub mod tree;
pub mod vectors;

pub use distance::euclidean_distance;
pub use error::ForestError;
pub use forest::{
    DEFAULT_DIM, DEFAULT_LEAF_CAPACITY, DEFAULT_TREES, DEFAULT_TWO_MEANS_ITERATIONS, Forest,
    ForestBuilder, ForestConfig,
};
pub use forest_io::{
    FOREST_FILE, LABELS_FILE, load as load_forest, load_files, save as save_forest, save_files,
    save_labels,
};
pub use index::{Candidate, DEFAULT_SEARCH_BUDGET, ForestIndex};
pub use label::{identity_of, make_label};
pub use tree::Tree;
pub use vectors::VectorSet;
