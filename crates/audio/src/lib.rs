//! Soundalike audio analysis
//!
//! Decodes library files and reduces them to fixed-length MFCC embeddings

pub mod audio;
pub mod extractor;
pub mod mfcc;

// Re-export main types
pub use audio::{decode_audio, is_supported_audio, scan_library, AudioBuffer};
pub use extractor::{FeatureExtractor, MfccExtractor};
pub use mfcc::MfccParams;
