//! Audio decoding and preprocessing
//!
//! Decodes library files with symphonia and prepares mono PCM for analysis

use soundalike_common::{Result, SoundalikeError};
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

/// Supported audio file extensions
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "aac", "aiff", "flac", "m4a", "mp3", "mp4", "oga", "ogg", "wav", "webm",
];

/// Check if file extension is supported
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// List the supported audio files directly inside `dir`, sorted by file name.
///
/// The listing order defines the catalog order, so it must not depend on
/// the order the file system happens to return entries in.
pub fn scan_library(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        SoundalikeError::file_system(format!(
            "Failed to read music directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let mut assets = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_supported_audio(&path) {
            assets.push(path);
        }
    }

    assets.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    info!("Found {} audio files in {}", assets.len(), dir.display());
    Ok(assets)
}

/// Decoded PCM audio (interleaved f32 samples)
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Audio samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels
    pub channels: u16,
}

impl AudioBuffer {
    /// Create a new audio buffer
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Get duration in seconds
    pub fn duration(&self) -> f32 {
        let frames = self.samples.len() / self.channels.max(1) as usize;
        frames as f32 / self.sample_rate as f32
    }

    /// Convert to mono by averaging channels
    pub fn to_mono(mut self) -> Self {
        if self.channels <= 1 {
            self.channels = 1;
            return self;
        }

        let channels = self.channels as usize;
        self.samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        self.channels = 1;
        self
    }

    /// Resample a mono buffer to `target_rate` with linear interpolation
    pub fn resample(mut self, target_rate: u32) -> Self {
        if self.sample_rate == target_rate || self.samples.is_empty() {
            self.sample_rate = target_rate;
            return self;
        }

        debug!("Resampling from {}Hz to {}Hz", self.sample_rate, target_rate);

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let new_length = (self.samples.len() as f64 / ratio) as usize;
        let last = self.samples.len() - 1;

        self.samples = (0..new_length)
            .map(|i| {
                let src = i as f64 * ratio;
                let lo = (src.floor() as usize).min(last);
                let hi = (lo + 1).min(last);
                let fraction = (src - lo as f64) as f32;
                self.samples[lo] * (1.0 - fraction) + self.samples[hi] * fraction
            })
            .collect();
        self.sample_rate = target_rate;
        self
    }

    /// Keep at most the first `secs` seconds
    pub fn truncate_secs(mut self, secs: f32) -> Self {
        let max_samples =
            (secs * self.sample_rate as f32) as usize * self.channels.max(1) as usize;
        self.samples.truncate(max_samples);
        self
    }
}

/// Decode up to `max_secs` seconds of an audio file.
///
/// Any failure (missing file, unknown container, corrupt stream) is reported
/// as `UnreadableAsset`.
pub fn decode_audio(path: &Path, max_secs: f32) -> Result<AudioBuffer> {
    let unreadable = |what: &str, e: &dyn std::fmt::Display| {
        SoundalikeError::unreadable_asset(format!("{}: {}: {}", path.display(), what, e))
    };

    let file = std::fs::File::open(path).map_err(|e| unreadable("open failed", &e))?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| unreadable("unrecognized format", &e))?;
    let mut format = probed.format;

    let track = format.default_track().ok_or_else(|| {
        SoundalikeError::unreadable_asset(format!("{}: no audio track", path.display()))
    })?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| unreadable("unsupported codec", &e))?;

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut samples = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count()) as u16;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(unreadable("read failed", &e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packets are skipped, the rest of the stream is still usable
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping undecodable packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(unreadable("decode failed", &e)),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count() as u16;

        let needed = decoded.capacity() * spec.channels.count();
        if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }

        if sample_rate > 0 && channels > 0 {
            let limit = (max_secs * sample_rate as f32) as usize * channels as usize;
            if samples.len() >= limit {
                break;
            }
        }
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(SoundalikeError::unreadable_asset(format!(
            "{}: no audio samples decoded",
            path.display()
        )));
    }

    Ok(AudioBuffer::new(samples, sample_rate, channels).truncate_secs(max_secs))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Write a 16-bit PCM WAV file
    pub(crate) fn write_test_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }

    pub(crate) fn sine(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_is_supported_audio() {
        assert!(is_supported_audio(Path::new("test.wav")));
        assert!(is_supported_audio(Path::new("test.MP3")));
        assert!(is_supported_audio(Path::new("test.flac")));
        assert!(!is_supported_audio(Path::new("test.txt")));
        assert!(!is_supported_audio(Path::new("cover")));
    }

    #[test]
    fn test_to_mono() {
        let buffer = AudioBuffer::new(vec![0.5, -0.5, 1.0, 0.0], 16000, 2);
        let mono = buffer.to_mono();
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples, vec![0.0, 0.5]);
    }

    #[test]
    fn test_resample() {
        let buffer = AudioBuffer::new(vec![0.0; 44100], 44100, 1);
        let resampled = buffer.resample(22050);
        assert_eq!(resampled.sample_rate, 22050);
        assert!((resampled.samples.len() as i32 - 22050).abs() < 10);

        let empty = AudioBuffer::new(Vec::new(), 44100, 1).resample(22050);
        assert!(empty.samples.is_empty());
    }

    #[test]
    fn test_truncate_secs() {
        let buffer = AudioBuffer::new(vec![0.0; 3000], 1000, 1).truncate_secs(2.0);
        assert_eq!(buffer.samples.len(), 2000);
        assert_eq!(buffer.duration(), 2.0);
    }

    #[test]
    fn test_scan_library_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.wav", "notes.txt", "c.flac"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.mp3")).unwrap();

        let assets = scan_library(dir.path()).unwrap();
        let names: Vec<_> = assets
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.mp3", "c.flac"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let err = scan_library(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, SoundalikeError::FileSystem(_)));
    }

    #[test]
    fn test_decode_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, &sine(440.0, 8000, 3.0), 8000, 1);

        let audio = decode_audio(&path, 2.0).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.samples.len(), 16000);
    }

    #[test]
    fn test_decode_garbage_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let err = decode_audio(&path, 30.0).unwrap_err();
        assert!(matches!(err, SoundalikeError::UnreadableAsset(_)));
    }
}
