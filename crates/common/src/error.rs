/// Soundalike error types
#[derive(Debug, thiserror::Error)]
pub enum SoundalikeError {
    /// Audio asset could not be decoded or analysed
    #[error("Unreadable asset: {0}")]
    UnreadableAsset(String),

    /// Vector dimension does not match the store/index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted store or index is structurally inconsistent
    #[error("Corrupt store: {0}")]
    CorruptStore(String),

    /// Query track is not part of the catalog
    #[error("Track not found: {0}")]
    TrackNotFound(String),

    /// No candidates left after removing the query track
    #[error("No recommendations available for: {0}")]
    EmptyRecommendation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error
    #[error("File system error: {0}")]
    FileSystem(String),

    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SoundalikeError {
    /// Create unreadable asset error
    pub fn unreadable_asset<S: Into<String>>(msg: S) -> Self {
        Self::UnreadableAsset(msg.into())
    }

    /// Create dimension mismatch error
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create corrupt store error
    pub fn corrupt_store<S: Into<String>>(msg: S) -> Self {
        Self::CorruptStore(msg.into())
    }

    /// Create track not found error
    pub fn track_not_found<S: Into<String>>(track: S) -> Self {
        Self::TrackNotFound(track.into())
    }

    /// Create empty recommendation error
    pub fn empty_recommendation<S: Into<String>>(track: S) -> Self {
        Self::EmptyRecommendation(track.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create file system error
    pub fn file_system<S: Into<String>>(msg: S) -> Self {
        Self::FileSystem(msg.into())
    }

    /// Create network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

// HTTP response conversion
impl SoundalikeError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::DimensionMismatch { .. } => 400,
            Self::TrackNotFound(_) => 404,
            Self::EmptyRecommendation(_) => 404,
            Self::NotFound(_) => 404,
            Self::UnreadableAsset(_) => 422,
            Self::CorruptStore(_) => 500,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
            Self::FileSystem(_) => 500,
            Self::Network(_) => 503,
            Self::Io(_) => 500,
            Self::Json(_) => 400,
            Self::Other(_) => 500,
        }
    }

    /// True for errors the caller caused by asking about something absent
    pub fn is_not_found(&self) -> bool {
        self.status_code() == 404
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(SoundalikeError::track_not_found("a.mp3").status_code(), 404);
        assert_eq!(SoundalikeError::empty_recommendation("a.mp3").status_code(), 404);
        assert_eq!(SoundalikeError::invalid_input("top_n").status_code(), 400);
        assert_eq!(SoundalikeError::corrupt_store("rows").status_code(), 500);
        assert!(SoundalikeError::track_not_found("x").is_not_found());
        assert!(SoundalikeError::empty_recommendation("x").is_not_found());
        assert!(!SoundalikeError::invalid_input("top_n").is_not_found());
        assert!(!SoundalikeError::network("down").is_not_found());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = SoundalikeError::dimension_mismatch(20, 13);
        assert_eq!(err.to_string(), "Dimension mismatch: expected 20, got 13");
    }
}
