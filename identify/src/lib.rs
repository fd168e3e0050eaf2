//! Face identification on top of a random projection forest.
//!
//! A query vector is resolved to raw neighbor hits by
//! [`visage_forest::ForestIndex`], and the hits are collapsed into a ranked
//! list of identities by [`IdentityAggregator`]. [`Matcher`] ties both
//! together behind a single `search` call.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use visage_forest::{ForestBuilder, ForestConfig, VectorSet};
//! use visage_identify::{Matcher, MatcherConfig, NoMetadata};
//!
//! let items = VectorSet::from_triples(vec![
//!     ("alice", "1.jpg", vec![1.0, 0.0]),
//!     ("alice", "2.jpg", vec![0.9, 0.1]),
//!     ("bob", "1.jpg", vec![0.0, 1.0]),
//! ])
//! .unwrap();
//! let forest = ForestBuilder::new(ForestConfig::default()).build(items).unwrap();
//!
//! let matcher = Matcher::new(MatcherConfig::default(), Arc::new(NoMetadata));
//! matcher.load(forest).unwrap();
//!
//! let ranked = matcher.search(&[1.0, 0.0], 10, Some(20.0)).unwrap();
//! assert_eq!(ranked[0].id, "alice");
//! assert_eq!(ranked[0].hits, 2);
//! ```
//!
//! # Ranking
//!
//! The first hit of an identity records its distance rounded to two
//! decimals. Every further hit on the same identity subtracts a fixed 0.5,
//! so identities backed by several close reference faces move up.

mod aggregate;
mod error;
mod matcher;
mod metadata;

pub use aggregate::{
    AggregatedResult, AggregatorConfig, DISTANCE_PRECISION, IdentityAggregator, REPEAT_HIT_BONUS,
};
pub use error::MatchError;
pub use matcher::{
    DEFAULT_CANDIDATES, DEFAULT_RESULT_LIMIT, DEFAULT_THRESHOLD, Matcher, MatcherConfig,
    SearchResponse,
};
pub use metadata::{MemoryMetadata, MetadataStore, NOT_AVAILABLE, NoMetadata, Performer};
