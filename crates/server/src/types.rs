use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use soundalike_common::SoundalikeError;

/// Recommendation query string
#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    /// Track identifier (file name)
    pub song: String,

    /// Number of recommendations, server default when absent
    pub top_n: Option<usize>,
}

/// Recommendation response
#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
    /// Query track
    pub query: String,

    /// Recommended tracks, most similar first
    pub recommendations: Vec<String>,

    /// Squared distance of each recommendation
    pub distances: Vec<f32>,
}

/// Catalog statistics
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub tracks: usize,
    pub dimension: usize,
    pub digest: String,
    pub built_at: DateTime<Utc>,
    pub playback_enabled: bool,
}

/// Status message
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl From<&SoundalikeError> for ErrorResponse {
    fn from(err: &SoundalikeError) -> Self {
        let detail = match err {
            SoundalikeError::TrackNotFound(_) => "Song not found".to_string(),
            SoundalikeError::EmptyRecommendation(_) => "No recommendations found".to_string(),
            other => other.to_string(),
        };
        Self { detail }
    }
}
