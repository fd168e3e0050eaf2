use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ForestError;
use crate::forest::Forest;
use crate::tree::{Node, Tree};
use crate::vectors::VectorSet;

/// Binary format magic and version.
const FOREST_MAGIC: [u8; 4] = [b'V', b'F', b'S', b'T'];
const FOREST_VERSION: u32 = 1;

const NODE_LEAF: u8 = 0;
const NODE_SPLIT: u8 = 1;

/// Upper bound on speculative allocations driven by header counts.
const MAX_PREALLOC: usize = 1 << 20;

/// Conventional file name of the forest artifact.
pub const FOREST_FILE: &str = "face.db";
/// Conventional file name of the label table artifact.
pub const LABELS_FILE: &str = "face.json";

/// Label table layout written by [`save_labels`].
#[derive(Serialize)]
struct LabelTableRef<'a> {
    dim: usize,
    labels: &'a [String],
}

/// Label table layouts accepted on load. A bare array carries no dimension.
#[derive(Deserialize)]
#[serde(untagged)]
enum LabelTable {
    Table { dim: usize, labels: Vec<String> },
    Bare(Vec<String>),
}

/// Save serializes the forest structure and vectors in a compact binary
/// format:
///
/// ```text
/// [4B magic "VFST"] [4B version=1]
/// [4B dim] [4B leafCapacity] [4B numItems] [4B numTrees]
/// [numItems x dim x 4B float32 vectors]
/// For each tree:
///   [4B numNodes] [4B root]
///   For each node:
///     [1B kind]
///     kind 0 (leaf):  [4B len] [len x 4B item ordinals]
///     kind 1 (split): [4B left] [4B right] [4B offset float32] [dim x 4B float32 normal]
/// ```
///
/// All multi-byte values are little-endian. Labels are not part of this
/// artifact; see [`save_labels`].
pub fn save(forest: &Forest, w: &mut dyn Write) -> Result<(), ForestError> {
    let dim = header_u32("dimension", forest.dim())?;
    let leaf_capacity = header_u32("leaf capacity", forest.leaf_capacity())?;
    let num_items = header_u32("item count", forest.len())?;
    let num_trees = header_u32("tree count", forest.tree_count())?;

    let mut bw = BufWriter::new(w);
    let write_err = |e: std::io::Error| ForestError::Io(e.to_string());

    // Header.
    bw.write_all(&FOREST_MAGIC).map_err(write_err)?;
    bw.write_all(&FOREST_VERSION.to_le_bytes()).map_err(write_err)?;

    bw.write_all(&dim.to_le_bytes()).map_err(write_err)?;
    bw.write_all(&leaf_capacity.to_le_bytes()).map_err(write_err)?;
    bw.write_all(&num_items.to_le_bytes()).map_err(write_err)?;
    bw.write_all(&num_trees.to_le_bytes()).map_err(write_err)?;

    // Vectors.
    for &v in forest.items().data() {
        bw.write_all(&v.to_le_bytes()).map_err(write_err)?;
    }

    // Trees.
    for tree in forest.trees() {
        bw.write_all(&(tree.nodes.len() as u32).to_le_bytes()).map_err(write_err)?;
        bw.write_all(&tree.root.to_le_bytes()).map_err(write_err)?;

        for node in &tree.nodes {
            match node {
                Node::Leaf(items) => {
                    bw.write_all(&[NODE_LEAF]).map_err(write_err)?;
                    bw.write_all(&(items.len() as u32).to_le_bytes()).map_err(write_err)?;
                    for &i in items {
                        bw.write_all(&i.to_le_bytes()).map_err(write_err)?;
                    }
                }
                Node::Split {
                    normal,
                    offset,
                    left,
                    right,
                } => {
                    bw.write_all(&[NODE_SPLIT]).map_err(write_err)?;
                    bw.write_all(&left.to_le_bytes()).map_err(write_err)?;
                    bw.write_all(&right.to_le_bytes()).map_err(write_err)?;
                    bw.write_all(&offset.to_le_bytes()).map_err(write_err)?;
                    for &v in normal {
                        bw.write_all(&v.to_le_bytes()).map_err(write_err)?;
                    }
                }
            }
        }
    }

    bw.flush().map_err(write_err)?;
    Ok(())
}

fn header_u32(field: &str, value: usize) -> Result<u32, ForestError> {
    u32::try_from(value)
        .map_err(|_| ForestError::InvalidConfig(format!("{field} {value} does not fit in u32")))
}

/// Save the ordinal → label table as JSON: `{"dim": D, "labels": [...]}`.
pub fn save_labels(forest: &Forest, w: &mut dyn Write) -> Result<(), ForestError> {
    let mut bw = BufWriter::new(w);
    let table = LabelTableRef {
        dim: forest.dim(),
        labels: forest.items().labels(),
    };
    serde_json::to_writer(&mut bw, &table).map_err(|e| ForestError::Json(e.to_string()))?;
    bw.flush().map_err(|e| ForestError::Io(e.to_string()))?;
    Ok(())
}

/// Load deserializes a forest from its two artifacts.
///
/// Both must be present and agree with each other; any structural problem
/// is reported as [`ForestError::CorruptIndex`] and nothing is returned.
pub fn load(forest_r: &mut dyn Read, labels_r: &mut dyn Read) -> Result<Forest, ForestError> {
    let mut br = BufReader::new(forest_r);

    let mut buf4 = [0u8; 4];
    br.read_exact(&mut buf4).map_err(read_err)?;
    if buf4 != FOREST_MAGIC {
        return Err(ForestError::CorruptIndex(format!("invalid magic {:?}", buf4)));
    }

    let version = read_u32(&mut br)?;
    if version != FOREST_VERSION {
        return Err(ForestError::CorruptIndex(format!(
            "unsupported version {version} (want {FOREST_VERSION})"
        )));
    }

    let dim = read_u32(&mut br)? as usize;
    let leaf_capacity = read_u32(&mut br)? as usize;
    let num_items = read_u32(&mut br)? as usize;
    let num_trees = read_u32(&mut br)? as usize;

    if dim == 0 && num_items > 0 {
        return Err(ForestError::CorruptIndex("invalid dimension 0".into()));
    }
    if leaf_capacity == 0 {
        return Err(ForestError::CorruptIndex("invalid leaf capacity 0".into()));
    }

    // Vectors.
    let total = num_items
        .checked_mul(dim)
        .ok_or_else(|| ForestError::CorruptIndex("vector table size overflows".into()))?;
    let mut data = Vec::with_capacity(total.min(MAX_PREALLOC));
    for _ in 0..total {
        data.push(read_f32(&mut br)?);
    }

    // Trees.
    let mut trees = Vec::with_capacity(num_trees.min(MAX_PREALLOC));
    for t in 0..num_trees {
        trees.push(read_tree(&mut br, t, dim, num_items)?);
    }

    let mut rest = [0u8; 1];
    match br.read(&mut rest) {
        Ok(0) => {}
        Ok(_) => {
            return Err(ForestError::CorruptIndex(
                "trailing bytes after last tree".into(),
            ));
        }
        Err(e) => return Err(ForestError::Io(e.to_string())),
    }

    // Labels.
    let table: LabelTable = serde_json::from_reader(BufReader::new(labels_r))
        .map_err(|e| ForestError::CorruptIndex(format!("label table: {e}")))?;
    let labels = match table {
        LabelTable::Table {
            dim: label_dim,
            labels,
        } => {
            if label_dim != dim {
                return Err(ForestError::CorruptIndex(format!(
                    "label table dimension {label_dim} disagrees with forest dimension {dim}"
                )));
            }
            labels
        }
        LabelTable::Bare(labels) => labels,
    };
    if labels.len() != num_items {
        return Err(ForestError::CorruptIndex(format!(
            "{} labels for {num_items} items",
            labels.len()
        )));
    }

    let items = VectorSet::from_parts(dim, data, labels)?;
    Ok(Forest::from_parts(items, trees, leaf_capacity))
}

/// Write both artifacts into `dir` as [`FOREST_FILE`] and [`LABELS_FILE`].
pub fn save_files(forest: &Forest, dir: &Path) -> Result<(), ForestError> {
    let io_err = |e: std::io::Error| ForestError::Io(e.to_string());
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut f = File::create(dir.join(FOREST_FILE)).map_err(io_err)?;
    save(forest, &mut f)?;
    f.sync_all().map_err(io_err)?;

    let mut f = File::create(dir.join(LABELS_FILE)).map_err(io_err)?;
    save_labels(forest, &mut f)?;
    f.sync_all().map_err(io_err)?;
    Ok(())
}

/// Load both artifacts from `dir`.
pub fn load_files(dir: &Path) -> Result<Forest, ForestError> {
    let start = Instant::now();
    let open = |name: &str| {
        File::open(dir.join(name))
            .map_err(|e| ForestError::Io(format!("open {}: {e}", dir.join(name).display())))
    };
    let mut forest_f = open(FOREST_FILE)?;
    let mut labels_f = open(LABELS_FILE)?;
    let forest = load(&mut forest_f, &mut labels_f)?;

    info!(
        dir = %dir.display(),
        items = forest.len(),
        dim = forest.dim(),
        trees = forest.tree_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "forest: loaded"
    );
    Ok(forest)
}

fn read_tree(
    br: &mut impl Read,
    t: usize,
    dim: usize,
    num_items: usize,
) -> Result<Tree, ForestError> {
    let num_nodes = read_u32(br)? as usize;
    let root = read_u32(br)?;
    if num_nodes == 0 {
        return Err(ForestError::CorruptIndex(format!("tree {t} has no nodes")));
    }
    if root as usize >= num_nodes {
        return Err(ForestError::CorruptIndex(format!(
            "tree {t}: root {root} out of bounds (numNodes={num_nodes})"
        )));
    }

    let mut nodes = Vec::with_capacity(num_nodes.min(MAX_PREALLOC));
    for i in 0..num_nodes {
        let mut kind = [0u8; 1];
        br.read_exact(&mut kind).map_err(read_err)?;
        match kind[0] {
            NODE_LEAF => {
                let len = read_u32(br)? as usize;
                let mut items = Vec::with_capacity(len.min(MAX_PREALLOC));
                for _ in 0..len {
                    let ordinal = read_u32(br)?;
                    if ordinal as usize >= num_items {
                        return Err(ForestError::CorruptIndex(format!(
                            "tree {t}: item {ordinal} out of bounds (numItems={num_items})"
                        )));
                    }
                    items.push(ordinal);
                }
                nodes.push(Node::Leaf(items));
            }
            NODE_SPLIT => {
                let left = read_u32(br)?;
                let right = read_u32(br)?;
                // Children always follow their parent, which rules out cycles.
                for child in [left, right] {
                    if child as usize <= i || child as usize >= num_nodes {
                        return Err(ForestError::CorruptIndex(format!(
                            "tree {t}: node {i} has invalid child {child} (numNodes={num_nodes})"
                        )));
                    }
                }
                let offset = read_f32(br)?;
                let mut normal = Vec::with_capacity(dim);
                for _ in 0..dim {
                    normal.push(read_f32(br)?);
                }
                nodes.push(Node::Split {
                    normal,
                    offset,
                    left,
                    right,
                });
            }
            other => {
                return Err(ForestError::CorruptIndex(format!(
                    "tree {t}: unknown node kind {other}"
                )));
            }
        }
    }
    Ok(Tree { nodes, root })
}

fn read_err(e: std::io::Error) -> ForestError {
    if e.kind() == ErrorKind::UnexpectedEof {
        ForestError::CorruptIndex("truncated forest file".into())
    } else {
        ForestError::Io(e.to_string())
    }
}

fn read_u32(br: &mut impl Read) -> Result<u32, ForestError> {
    let mut buf = [0u8; 4];
    br.read_exact(&mut buf).map_err(read_err)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32(br: &mut impl Read) -> Result<f32, ForestError> {
    let mut buf = [0u8; 4];
    br.read_exact(&mut buf).map_err(read_err)?;
    Ok(f32::from_le_bytes(buf))
}

impl Forest {
    /// Write the forest artifact to `forest_w` and the label table to
    /// `labels_w`.
    pub fn save(&self, forest_w: &mut dyn Write, labels_w: &mut dyn Write) -> Result<(), ForestError> {
        save(self, forest_w)?;
        save_labels(self, labels_w)
    }

    /// Load a forest from both artifacts. See [`load`].
    pub fn load(forest_r: &mut dyn Read, labels_r: &mut dyn Read) -> Result<Forest, ForestError> {
        load(forest_r, labels_r)
    }

    /// See [`save_files`].
    pub fn save_files(&self, dir: &Path) -> Result<(), ForestError> {
        save_files(self, dir)
    }

    /// See [`load_files`].
    pub fn load_files(dir: &Path) -> Result<Forest, ForestError> {
        load_files(dir)
    }
}
