use crate::error::SoundalikeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Jellyfin connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JellyfinConfig {
    /// Jellyfin server URL
    pub host: String,

    /// API key sent as `X-Emby-Token`
    pub api_key: String,

    /// Playlist receiving queued recommendations
    pub playlist_id: String,

    /// Music library folder id
    pub music_folder_id: String,
}

/// Soundalike application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory scanned for audio files
    pub music_dir: PathBuf,

    /// Directory holding the persisted catalog
    pub data_dir: PathBuf,

    /// Embedding store file path
    pub store_path: PathBuf,

    /// Similarity index file path
    pub index_path: PathBuf,

    /// Seconds of audio analysed per track
    pub extract_duration_secs: f32,

    /// Parallel extraction workers
    pub extract_workers: usize,

    /// Default number of recommendations
    pub default_top_n: usize,

    /// Server bind address
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Jellyfin integration, disabled when no API key is configured
    pub jellyfin: Option<JellyfinConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            music_dir: PathBuf::from("./music"),
            data_dir: PathBuf::from("./embeddings"),
            store_path: PathBuf::from("./embeddings/embeddings.json"),
            index_path: PathBuf::from("./embeddings/index.json"),
            extract_duration_secs: 30.0,
            extract_workers: default_workers(),
            default_top_n: 5,
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            log_dir: PathBuf::from("./embeddings/log"),
            log_level: "info".to_string(),
            jellyfin: None,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl AppConfig {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, SoundalikeError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let data_dir = Self::get_env_path("DATA_DIR")
            .unwrap_or_else(|| PathBuf::from("./embeddings"));

        let config = Self {
            music_dir: Self::get_env_path("MUSIC_DIR")
                .unwrap_or_else(|| PathBuf::from("./music")),
            store_path: Self::get_env_path("STORE_PATH")
                .unwrap_or_else(|| data_dir.join("embeddings.json")),
            index_path: Self::get_env_path("INDEX_PATH")
                .unwrap_or_else(|| data_dir.join("index.json")),
            extract_duration_secs: Self::get_env_parsed("EXTRACT_DURATION_SECS")?
                .unwrap_or(30.0),
            extract_workers: Self::get_env_parsed("EXTRACT_WORKERS")?
                .unwrap_or_else(default_workers),
            default_top_n: Self::get_env_parsed("DEFAULT_TOP_N")?.unwrap_or(5),
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: Self::get_env_parsed("SERVER_PORT")?.unwrap_or(8000),
            log_dir: Self::get_env_path("LOG_DIR")
                .unwrap_or_else(|| data_dir.join("log")),
            log_level: std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "info".to_string()),
            jellyfin: Self::jellyfin_from_env(),
            data_dir,
        };

        // Ensure required directories exist
        config.ensure_directories()?;

        Ok(config)
    }

    fn jellyfin_from_env() -> Option<JellyfinConfig> {
        let api_key = std::env::var("JELLYFIN_API_KEY").ok().filter(|k| !k.is_empty())?;

        Some(JellyfinConfig {
            host: std::env::var("JELLYFIN_HOST")
                .unwrap_or_else(|_| "http://localhost:8096".to_string()),
            api_key,
            playlist_id: std::env::var("JELLYFIN_PLAYLIST_ID")
                .unwrap_or_else(|_| "1".to_string()),
            music_folder_id: std::env::var("JELLYFIN_MUSIC_FOLDER_ID").unwrap_or_default(),
        })
    }

    /// Get PathBuf from environment variable
    fn get_env_path(key: &str) -> Option<PathBuf> {
        std::env::var(key).ok().map(PathBuf::from)
    }

    /// Parse an environment variable; unset is `None`, malformed is an error
    fn get_env_parsed<T>(key: &str) -> Result<Option<T>, SoundalikeError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match std::env::var(key) {
            Ok(raw) => raw.trim().parse().map(Some).map_err(|e| {
                SoundalikeError::config(format!("Invalid {} '{}': {}", key, raw, e))
            }),
            Err(_) => Ok(None),
        }
    }

    /// Ensure required directories exist, create if not
    pub fn ensure_directories(&self) -> Result<(), SoundalikeError> {
        let dirs = vec![&self.data_dir, &self.log_dir];

        for dir in dirs {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    SoundalikeError::config(format!(
                        "Failed to create directory {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Get server bind address (host:port)
    pub fn server_bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), SoundalikeError> {
        if self.extract_duration_secs <= 0.0 || !self.extract_duration_secs.is_finite() {
            return Err(SoundalikeError::config(
                "Extraction duration must be a positive number of seconds",
            ));
        }

        if self.extract_workers == 0 {
            return Err(SoundalikeError::config("Extraction workers cannot be 0"));
        }

        if self.default_top_n == 0 {
            return Err(SoundalikeError::config("Default top_n cannot be 0"));
        }

        // Validate port range
        if self.server_port == 0 {
            return Err(SoundalikeError::config("Server port cannot be 0"));
        }

        if let Some(jellyfin) = &self.jellyfin {
            if !jellyfin.host.starts_with("http://") && !jellyfin.host.starts_with("https://") {
                return Err(SoundalikeError::config(
                    "Jellyfin host must start with http:// or https://",
                ));
            }
        }

        Ok(())
    }
}
