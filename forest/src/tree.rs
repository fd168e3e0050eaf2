use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::distance::{dot, squared_distance};
use crate::error::ForestError;
use crate::vectors::VectorSet;

/// Attempts at finding a balanced hyperplane before falling back to a
/// random split.
const SPLIT_ATTEMPTS: usize = 3;

/// Largest share of a subset allowed on one side of an accepted split.
const MAX_IMBALANCE: f64 = 0.95;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node in a tree's flat arena. Children are arena indices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Leaf(Vec<u32>),
    Split {
        /// Unit normal of the hyperplane. All zeros for a random split.
        normal: Vec<f32>,
        offset: f32,
        left: u32,
        right: u32,
    },
}

impl Node {
    /// Signed distance of `v` to the hyperplane: `normal · v + offset`.
    pub(crate) fn margin(normal: &[f32], offset: f32, v: &[f32]) -> f32 {
        (dot(normal, v) + offset as f64) as f32
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Tree is one random projection tree over a [VectorSet].
///
/// Nodes live in a flat arena; every child index is greater than its
/// parent's, so traversal always terminates.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: u32,
}

impl Tree {
    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }

    /// Length of the longest root-to-leaf path, counted in edges.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self.root, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match &self.nodes[idx as usize] {
                Node::Leaf(_) => max_depth = max_depth.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        max_depth
    }

    pub(crate) fn node(&self, idx: u32) -> &Node {
        &self.nodes[idx as usize]
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Builds one tree from its own seeded random stream.
pub(crate) struct TreeBuilder<'a> {
    items: &'a VectorSet,
    leaf_capacity: usize,
    two_means_iterations: usize,
    rng: StdRng,
    fallbacks: usize,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(
        items: &'a VectorSet,
        leaf_capacity: usize,
        two_means_iterations: usize,
        seed: u64,
    ) -> Self {
        Self {
            items,
            leaf_capacity: leaf_capacity.max(1),
            two_means_iterations,
            rng: StdRng::seed_from_u64(seed),
            fallbacks: 0,
        }
    }

    pub(crate) fn build(mut self) -> Result<Tree, ForestError> {
        let all: Vec<u32> = (0..self.items.len() as u32).collect();

        // Slots are allocated before their subsets are processed, so a
        // node's children always sit after it in the arena.
        let mut nodes = vec![Node::Leaf(Vec::new())];
        let mut stack = vec![(0u32, all)];

        while let Some((slot, subset)) = stack.pop() {
            if subset.len() <= self.leaf_capacity {
                nodes[slot as usize] = Node::Leaf(subset);
                continue;
            }

            let (normal, offset, left_items, right_items) = self.split(&subset);

            let left = u32::try_from(nodes.len())
                .map_err(|_| ForestError::InvalidConfig("tree exceeds u32 node ids".into()))?;
            let right = left
                .checked_add(1)
                .ok_or_else(|| ForestError::InvalidConfig("tree exceeds u32 node ids".into()))?;
            nodes.push(Node::Leaf(Vec::new()));
            nodes.push(Node::Leaf(Vec::new()));
            nodes[slot as usize] = Node::Split {
                normal,
                offset,
                left,
                right,
            };

            stack.push((right, right_items));
            stack.push((left, left_items));
        }

        if self.fallbacks > 0 {
            debug!(fallbacks = self.fallbacks, "forest: random splits used");
        }

        Ok(Tree { nodes, root: 0 })
    }

    /// Partition `subset` into two non-empty sides.
    fn split(&mut self, subset: &[u32]) -> (Vec<f32>, f32, Vec<u32>, Vec<u32>) {
        for _ in 0..SPLIT_ATTEMPTS {
            let (normal, offset) = self.hyperplane(subset);
            let mut left = Vec::with_capacity(subset.len() / 2);
            let mut right = Vec::with_capacity(subset.len() / 2);
            for &i in subset {
                let m = Node::margin(&normal, offset, self.items.row(i));
                let goes_right = if m == 0.0 { self.rng.gen_bool(0.5) } else { m > 0.0 };
                if goes_right {
                    right.push(i);
                } else {
                    left.push(i);
                }
            }
            if imbalance(left.len(), right.len()) <= MAX_IMBALANCE {
                return (normal, offset, left, right);
            }
        }

        // Duplicate or near-duplicate vectors: no plane separates them.
        self.fallbacks += 1;
        let mut shuffled = subset.to_vec();
        shuffled.shuffle(&mut self.rng);
        let right = shuffled.split_off(shuffled.len() / 2);
        (vec![0.0; self.items.dim()], 0.0, shuffled, right)
    }

    /// Plane equidistant between two centroids found by [`Self::two_means`].
    fn hyperplane(&mut self, subset: &[u32]) -> (Vec<f32>, f32) {
        let (p, q) = self.two_means(subset);

        let mut normal: Vec<f32> = p.iter().zip(q.iter()).map(|(a, b)| a - b).collect();
        let norm = dot(&normal, &normal).sqrt();
        if norm > 0.0 {
            let scale = (1.0 / norm) as f32;
            for v in &mut normal {
                *v *= scale;
            }
        }

        let midpoint: Vec<f32> = p.iter().zip(q.iter()).map(|(a, b)| (a + b) * 0.5).collect();
        let offset = -dot(&normal, &midpoint) as f32;
        (normal, offset)
    }

    /// Pick two far-apart centroids: seed with two distinct random items,
    /// then pull the nearer centroid towards each sampled item.
    fn two_means(&mut self, subset: &[u32]) -> (Vec<f32>, Vec<f32>) {
        let n = subset.len();
        let i = self.rng.gen_range(0..n);
        let mut j = self.rng.gen_range(0..n - 1);
        if j >= i {
            j += 1;
        }

        let mut p = self.items.row(subset[i]).to_vec();
        let mut q = self.items.row(subset[j]).to_vec();
        let mut p_count = 1.0f64;
        let mut q_count = 1.0f64;

        for _ in 0..self.two_means_iterations {
            let x = self.items.row(subset[self.rng.gen_range(0..n)]);
            let dp = p_count * squared_distance(&p, x);
            let dq = q_count * squared_distance(&q, x);
            if dp < dq {
                pull(&mut p, x, p_count);
                p_count += 1.0;
            } else if dq < dp {
                pull(&mut q, x, q_count);
                q_count += 1.0;
            }
        }
        (p, q)
    }
}

/// Move a running mean of `count` samples towards `x`.
fn pull(centroid: &mut [f32], x: &[f32], count: f64) {
    for (c, &v) in centroid.iter_mut().zip(x.iter()) {
        *c = ((*c as f64 * count + v as f64) / (count + 1.0)) as f32;
    }
}

/// Share of items on the larger side.
fn imbalance(left: usize, right: usize) -> f64 {
    let total = (left + right) as f64;
    if total == 0.0 {
        return 0.0;
    }
    left.max(right) as f64 / total
}
