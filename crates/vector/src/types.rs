use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Store file format tag
pub const STORE_FORMAT: &str = "soundalike-embeddings-v1";

/// Index file format tag
pub const INDEX_FORMAT: &str = "flat-l2";

/// One nearest-neighbor hit, by index position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    /// Row of the matched vector in the index
    pub position: usize,

    /// Squared Euclidean distance to the query
    pub distance: f32,
}

impl Neighbor {
    pub fn new(position: usize, distance: f32) -> Self {
        Self { position, distance }
    }
}

// Ascending distance, then ascending position
impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One recommended track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Track identifier (file name)
    pub track: String,

    /// Squared Euclidean distance to the query track
    pub distance: f32,
}

impl Recommendation {
    pub fn new(track: impl Into<String>, distance: f32) -> Self {
        Self {
            track: track.into(),
            distance,
        }
    }
}
