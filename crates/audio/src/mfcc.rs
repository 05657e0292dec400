//! Mel-frequency cepstral coefficients
//!
//! STFT power spectrogram → Slaney mel filterbank → decibels → orthonormal
//! DCT-II. Parameters default to the usual music-analysis settings
//! (22.05 kHz, 2048-point FFT, hop 512, 128 mel bands, 20 coefficients).

use ndarray::{Array1, Array2, Axis};
use rustfft::{num_complex::Complex, FftPlanner};

/// Floor applied before taking logarithms
const AMIN: f32 = 1e-10;

/// MFCC analysis parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MfccParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub n_mfcc: usize,
    /// Dynamic range kept below the loudest bin, in dB
    pub top_db: f32,
}

impl Default for MfccParams {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            n_mfcc: 20,
            top_db: 80.0,
        }
    }
}

/// Power spectrogram of centered, Hann-windowed frames, shape `(n_fft/2 + 1, frames)`.
///
/// The signal is zero-padded by `n_fft / 2` on both sides so frame `t` is
/// centered on sample `t * hop_length`.
pub fn power_spectrogram(samples: &[f32], n_fft: usize, hop_length: usize) -> Array2<f32> {
    let bins = n_fft / 2 + 1;
    let pad = n_fft / 2;

    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let n_frames = if padded.len() >= n_fft {
        1 + (padded.len() - n_fft) / hop_length
    } else {
        0
    };

    // Periodic Hann window
    let window: Vec<f32> = (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n_fft as f32).cos())
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut spec = Array2::<f32>::zeros((bins, n_frames));
    let mut buf = vec![Complex::new(0.0f32, 0.0); n_fft];

    for t in 0..n_frames {
        let start = t * hop_length;
        for (slot, (s, w)) in buf
            .iter_mut()
            .zip(padded[start..start + n_fft].iter().zip(window.iter()))
        {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buf);
        for (b, c) in buf[..bins].iter().enumerate() {
            spec[[b, t]] = c.norm_sqr();
        }
    }

    spec
}

fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;

    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;

    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Slaney-normalized triangular mel filterbank, shape `(n_mels, n_fft/2 + 1)`
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    let bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;

    let fft_freqs: Vec<f32> = (0..bins)
        .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
        .collect();

    let max_mel = hz_to_mel(nyquist);
    let mel_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut weights = Array2::<f32>::zeros((n_mels, bins));
    for m in 0..n_mels {
        let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
        let enorm = 2.0 / (right - left);
        for (b, &f) in fft_freqs.iter().enumerate() {
            let lower = (f - left) / (center - left);
            let upper = (right - f) / (right - center);
            let w = lower.min(upper).max(0.0);
            weights[[m, b]] = w * enorm;
        }
    }

    weights
}

/// Convert power to decibels relative to 1.0, clipped `top_db` below the peak
pub fn power_to_db(power: &Array2<f32>, top_db: f32) -> Array2<f32> {
    let mut db = power.mapv(|p| 10.0 * p.max(AMIN).log10());
    let peak = db.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if peak.is_finite() {
        let floor = peak - top_db;
        db.mapv_inplace(|v| v.max(floor));
    }
    db
}

/// Orthonormal DCT-II basis, shape `(n_out, n_in)`
pub fn dct_matrix(n_out: usize, n_in: usize) -> Array2<f32> {
    let mut basis = Array2::<f32>::zeros((n_out, n_in));
    let scale0 = (1.0 / n_in as f32).sqrt();
    let scale = (2.0 / n_in as f32).sqrt();

    for k in 0..n_out {
        let s = if k == 0 { scale0 } else { scale };
        for n in 0..n_in {
            basis[[k, n]] = s
                * (std::f32::consts::PI * k as f32 * (2 * n + 1) as f32 / (2 * n_in) as f32).cos();
        }
    }

    basis
}

/// MFCC matrix, shape `(n_mfcc, frames)`
pub fn mfcc(samples: &[f32], params: &MfccParams) -> Array2<f32> {
    let power = power_spectrogram(samples, params.n_fft, params.hop_length);
    let mel = mel_filterbank(params.sample_rate, params.n_fft, params.n_mels).dot(&power);
    let db = power_to_db(&mel, params.top_db);
    dct_matrix(params.n_mfcc, params.n_mels).dot(&db)
}

/// Per-coefficient mean of the MFCC matrix; `None` when no frame could be formed
pub fn mfcc_mean(samples: &[f32], params: &MfccParams) -> Option<Array1<f32>> {
    mfcc(samples, params).mean_axis(Axis(1))
}
