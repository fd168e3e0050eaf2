use std::collections::{BinaryHeap, HashSet};

use crate::distance::euclidean_distance;
use crate::error::ForestError;
use crate::forest::Forest;
use crate::tree::Node;

/// Default number of unique candidate items collected per query.
pub const DEFAULT_SEARCH_BUDGET: usize = 10_000;

/// Candidate is one query hit: an item ordinal and its exact distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub ordinal: u32,
    /// Euclidean distance to the query. Lower is closer.
    pub distance: f32,
}

// ---------------------------------------------------------------------------
// Internal priority-queue type
// ---------------------------------------------------------------------------

/// A deferred subtree. Min-heap on priority, then (tree, node) so that pop
/// order never depends on insertion order.
struct Pending {
    priority: f32,
    tree: u32,
    node: u32,
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}
impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}
impl Eq for Pending {}

// ---------------------------------------------------------------------------
// ForestIndex
// ---------------------------------------------------------------------------

/// ForestIndex answers approximate k-nearest-neighbor queries over a
/// [Forest].
///
/// Queries keep all traversal state local, so one index can serve any
/// number of concurrent callers.
pub struct ForestIndex {
    forest: Forest,
    search_budget: usize,
}

impl ForestIndex {
    pub fn new(forest: Forest) -> Self {
        Self {
            forest,
            search_budget: DEFAULT_SEARCH_BUDGET,
        }
    }

    /// Set the budget used when a query passes `search_budget == 0`.
    pub fn with_search_budget(mut self, budget: usize) -> Self {
        if budget > 0 {
            self.search_budget = budget;
        }
        self
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn search_budget(&self) -> usize {
        self.search_budget
    }

    /// Return up to `k` approximate nearest items to `vector`, closest first.
    ///
    /// Traversal stops once `search_budget` unique items have been collected
    /// (0 selects the index default). A budget of at least the item count
    /// makes the search exhaustive.
    pub fn query(
        &self,
        vector: &[f32],
        k: usize,
        search_budget: usize,
    ) -> Result<Vec<Candidate>, ForestError> {
        let dim = self.forest.dim();
        if dim != 0 && vector.len() != dim {
            return Err(ForestError::DimensionMismatch {
                expected: dim,
                got: vector.len(),
            });
        }
        if self.forest.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let budget = if search_budget == 0 {
            self.search_budget
        } else {
            search_budget
        };

        let collected = self.collect(vector, budget);

        let items = self.forest.items();
        let mut results: Vec<Candidate> = collected
            .into_iter()
            .map(|ordinal| Candidate {
                ordinal,
                distance: euclidean_distance(vector, items.row(ordinal)),
            })
            .collect();

        results.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        results.truncate(k);
        Ok(results)
    }

    /// Return up to `k` approximate nearest items to an indexed item.
    /// The item itself is included at distance 0.
    pub fn query_by_item(
        &self,
        ordinal: usize,
        k: usize,
        search_budget: usize,
    ) -> Result<Vec<Candidate>, ForestError> {
        let vector = self.forest.items().vector(ordinal)?;
        self.query(vector, k, search_budget)
    }

    /// Exact distance between two indexed items.
    pub fn distance(&self, i: usize, j: usize) -> Result<f32, ForestError> {
        let items = self.forest.items();
        Ok(euclidean_distance(items.vector(i)?, items.vector(j)?))
    }

    /// Best-first traversal of all trees, collecting unique leaf items.
    fn collect(&self, vector: &[f32], budget: usize) -> HashSet<u32> {
        let trees = self.forest.trees();
        let mut seen: HashSet<u32> = HashSet::with_capacity(budget.min(self.forest.len()));
        let mut queue: BinaryHeap<Pending> = BinaryHeap::with_capacity(trees.len() * 2);

        for (t, tree) in trees.iter().enumerate() {
            queue.push(Pending {
                priority: 0.0,
                tree: t as u32,
                node: tree.root,
            });
        }

        while let Some(top) = queue.pop() {
            let tree = &trees[top.tree as usize];
            let mut node = top.node;

            // Follow the preferred side down to a leaf, deferring the other.
            loop {
                match tree.node(node) {
                    Node::Leaf(items) => {
                        seen.extend(items.iter().copied());
                        break;
                    }
                    Node::Split {
                        normal,
                        offset,
                        left,
                        right,
                    } => {
                        let m = Node::margin(normal, *offset, vector);
                        let (near, far) = if m > 0.0 { (*right, *left) } else { (*left, *right) };
                        queue.push(Pending {
                            priority: top.priority.max(m.abs()),
                            tree: top.tree,
                            node: far,
                        });
                        node = near;
                    }
                }
            }

            if seen.len() >= budget {
                break;
            }
        }
        seen
    }
}
