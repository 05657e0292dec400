pub mod config;
pub mod error;
pub mod logger;

// Re-export commonly used types
pub use config::{AppConfig, JellyfinConfig};
pub use error::SoundalikeError;
pub type Result<T> = std::result::Result<T, SoundalikeError>;
