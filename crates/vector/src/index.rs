use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use soundalike_common::{Result, SoundalikeError};
use std::collections::BinaryHeap;
use std::path::Path;
use tracing::{debug, info};

use crate::persist;
use crate::types::{Neighbor, INDEX_FORMAT};

/// Exact nearest-neighbor index under squared Euclidean distance.
///
/// Every query is compared against every row. For a personal library of a
/// few tens of thousands of tracks this is fast enough and never loses a
/// neighbor to approximation. The index holds no identifiers; callers map
/// positions back through the store it was built from.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    format: String,
    dimension: usize,
    /// Digest of the store the index was built from
    store_digest: String,
    vectors: Array2<f32>,
}

/// Squared Euclidean distance
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

impl FlatIndex {
    /// Build from a row-major `count × dimension` matrix
    pub fn build(vectors: ArrayView2<'_, f32>) -> Result<Self> {
        let dimension = vectors.ncols();
        if dimension == 0 {
            return Err(SoundalikeError::invalid_input(
                "Index dimension must be at least 1",
            ));
        }

        let data: Vec<f32> = vectors.iter().copied().collect();
        debug!("Built flat index - {} vectors of dimension {}", vectors.nrows(), dimension);
        Ok(Self { dimension, data })
    }

    /// Build from individual rows, all of which must have length `dimension`
    pub fn from_rows<'a, I>(dimension: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        if dimension == 0 {
            return Err(SoundalikeError::invalid_input(
                "Index dimension must be at least 1",
            ));
        }

        let mut data = Vec::new();
        for row in rows {
            if row.len() != dimension {
                return Err(SoundalikeError::dimension_mismatch(dimension, row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { dimension, data })
    }

    /// Up to `k` nearest rows to `query`, closest first.
    ///
    /// Equal distances are ordered by ascending position so identical
    /// inputs always produce identical output. A `k` above the row count is
    /// clamped; an empty index yields no hits.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(SoundalikeError::dimension_mismatch(self.dimension, query.len()));
        }
        if k == 0 {
            return Err(SoundalikeError::invalid_input("k must be at least 1"));
        }

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        // Max-heap of the best k so far; the root is the worst kept hit
        let mut best: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        for (position, row) in self.data.chunks_exact(self.dimension).enumerate() {
            let candidate = Neighbor::new(position, squared_l2(query, row));
            if best.len() < k {
                best.push(candidate);
            } else if best.peek().is_some_and(|worst| candidate < *worst) {
                best.pop();
                best.push(candidate);
            }
        }

        Ok(best.into_sorted_vec())
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Row at `position`
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.data.chunks_exact(self.dimension).nth(position)
    }

    fn matrix(&self) -> Result<Array2<f32>> {
        Array2::from_shape_vec((self.len(), self.dimension), self.data.clone())
            .map_err(|e| SoundalikeError::internal(format!("Index shape error: {}", e)))
    }

    /// Serialize the index, tagged with the digest of its source store
    pub fn to_json(&self, store_digest: &str) -> Result<String> {
        let file = IndexFile {
            format: INDEX_FORMAT.to_string(),
            dimension: self.dimension,
            store_digest: store_digest.to_string(),
            vectors: self.matrix()?,
        };
        Ok(serde_json::to_string(&file)?)
    }

    /// Parse an index document, returning the index and its source store digest
    pub fn from_json(data: &str) -> Result<(Self, String)> {
        let file: IndexFile = serde_json::from_str(data)
            .map_err(|e| SoundalikeError::corrupt_store(format!("Unparseable index file: {}", e)))?;

        if file.format != INDEX_FORMAT {
            return Err(SoundalikeError::corrupt_store(format!(
                "Unknown index format: {}",
                file.format
            )));
        }
        if file.vectors.ncols() != file.dimension {
            return Err(SoundalikeError::corrupt_store(format!(
                "Declared dimension {} but index vectors have {} columns",
                file.dimension,
                file.vectors.ncols()
            )));
        }

        let index = Self::build(file.vectors.view())
            .map_err(|e| SoundalikeError::corrupt_store(e.to_string()))?;
        Ok((index, file.store_digest))
    }

    /// Atomically write the index to `path`
    pub fn save(&self, path: &Path, store_digest: &str) -> Result<()> {
        persist::write_atomic(path, self.to_json(store_digest)?.as_bytes())?;
        info!("Saved flat index ({} vectors) to {}", self.len(), path.display());
        Ok(())
    }

    /// Load an index, returning it with the digest of the store it belongs to
    pub fn load(path: &Path) -> Result<(Self, String)> {
        let data = persist::read_to_string(path, "similarity index")?;
        Self::from_json(&data)
    }
}
