use soundalike_common::{Result, SoundalikeError};
use std::path::Path;
use tracing::debug;

use crate::audio::decode_audio;
use crate::mfcc::{mfcc_mean, MfccParams};

/// Maps one audio asset to one fixed-length embedding
pub trait FeatureExtractor: Send + Sync {
    /// Embedding dimension produced by `extract`
    fn dimension(&self) -> usize;

    /// Compute the embedding of an audio file
    ///
    /// Fails with `UnreadableAsset` when the file cannot be decoded.
    fn extract(&self, path: &Path) -> Result<Vec<f32>>;
}

/// Mean-MFCC embedding over the opening seconds of a track
#[derive(Debug, Clone)]
pub struct MfccExtractor {
    params: MfccParams,
    duration_secs: f32,
}

impl MfccExtractor {
    pub fn new(duration_secs: f32) -> Self {
        Self::with_params(MfccParams::default(), duration_secs)
    }

    pub fn with_params(params: MfccParams, duration_secs: f32) -> Self {
        Self {
            params,
            duration_secs,
        }
    }

    pub fn params(&self) -> &MfccParams {
        &self.params
    }
}

impl Default for MfccExtractor {
    fn default() -> Self {
        Self::new(30.0)
    }
}

impl FeatureExtractor for MfccExtractor {
    fn dimension(&self) -> usize {
        self.params.n_mfcc
    }

    fn extract(&self, path: &Path) -> Result<Vec<f32>> {
        let audio = decode_audio(path, self.duration_secs)?
            .to_mono()
            .resample(self.params.sample_rate)
            .truncate_secs(self.duration_secs);

        debug!(
            "Analysing {} ({:.1}s at {}Hz)",
            path.display(),
            audio.duration(),
            audio.sample_rate
        );

        let embedding = mfcc_mean(&audio.samples, &self.params).ok_or_else(|| {
            SoundalikeError::unreadable_asset(format!("{}: audio too short", path.display()))
        })?;

        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(SoundalikeError::unreadable_asset(format!(
                "{}: non-finite features",
                path.display()
            )));
        }

        Ok(embedding.to_vec())
    }
}
