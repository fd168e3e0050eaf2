use crate::error::ForestError;
use crate::label::make_label;

/// VectorSet is the append-only item table a forest is built over.
///
/// Each item gets an ordinal in `[0, len)` at insertion time. Vectors are
/// kept in one contiguous row-major buffer; trees refer to items only by
/// ordinal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorSet {
    dim: usize,
    data: Vec<f32>,
    labels: Vec<String>,
}

impl VectorSet {
    /// Create an empty set. The dimension is fixed by the first insert.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set with a fixed dimension.
    pub fn with_dim(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Build a set from `(identity, suffix, vector)` triples in order.
    pub fn from_triples<I, S1, S2, V>(triples: I) -> Result<Self, ForestError>
    where
        I: IntoIterator<Item = (S1, S2, V)>,
        S1: AsRef<str>,
        S2: AsRef<str>,
        V: AsRef<[f32]>,
    {
        let mut set = Self::new();
        for (id, suffix, vector) in triples {
            set.insert(vector.as_ref(), make_label(id.as_ref(), suffix.as_ref()))?;
        }
        Ok(set)
    }

    /// Rebuild a set from raw parts (used by the index loader).
    pub(crate) fn from_parts(
        dim: usize,
        data: Vec<f32>,
        labels: Vec<String>,
    ) -> Result<Self, ForestError> {
        if data.len() != dim * labels.len() {
            return Err(ForestError::CorruptIndex(format!(
                "{} vector components for {} labels of dimension {dim}",
                data.len(),
                labels.len()
            )));
        }
        Ok(Self { dim, data, labels })
    }

    /// Append an item and return its ordinal.
    pub fn insert(&mut self, vector: &[f32], label: impl Into<String>) -> Result<usize, ForestError> {
        if vector.is_empty() {
            return Err(ForestError::InvalidConfig("empty vector".into()));
        }
        if self.dim == 0 {
            self.dim = vector.len();
        } else if vector.len() != self.dim {
            return Err(ForestError::DimensionMismatch {
                expected: self.dim,
                got: vector.len(),
            });
        }
        if self.labels.len() >= u32::MAX as usize {
            return Err(ForestError::InvalidConfig(format!(
                "vector set is full ({} items)",
                self.labels.len()
            )));
        }

        let ordinal = self.labels.len();
        self.data.extend_from_slice(vector);
        self.labels.push(label.into());
        Ok(ordinal)
    }

    /// Return the vector and label of an item.
    pub fn get(&self, ordinal: usize) -> Result<(&[f32], &str), ForestError> {
        Ok((self.vector(ordinal)?, self.label(ordinal)?))
    }

    /// Return the vector of an item.
    pub fn vector(&self, ordinal: usize) -> Result<&[f32], ForestError> {
        self.check(ordinal)?;
        Ok(self.row(ordinal as u32))
    }

    /// Return the label of an item.
    pub fn label(&self, ordinal: usize) -> Result<&str, ForestError> {
        self.check(ordinal)?;
        Ok(&self.labels[ordinal])
    }

    /// Vector of an ordinal known to be in range.
    pub(crate) fn row(&self, ordinal: u32) -> &[f32] {
        let start = ordinal as usize * self.dim;
        &self.data[start..start + self.dim]
    }

    /// All labels in ordinal order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub(crate) fn data(&self) -> &[f32] {
        &self.data
    }

    /// Vector dimension, or 0 if nothing was inserted and none was fixed.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn check(&self, ordinal: usize) -> Result<(), ForestError> {
        if ordinal >= self.labels.len() {
            return Err(ForestError::OutOfRange {
                ordinal,
                len: self.labels.len(),
            });
        }
        Ok(())
    }
}
