//! Log-mel spectrogram frontend.
//!
//! ## Parameters (must match between training and inference)
//!
//! | Parameter     | Default (22.05 kHz preset) |
//! |---------------|----------------------------|
//! | `n_fft`       | 1024                       |
//! | `win_size`    | 1024 (periodic Hann)       |
//! | `hop_size`    | 256                        |
//! | `num_mels`    | 80                         |
//! | `fmin..fmax`  | 0–8 000 Hz                 |
//! | `center`      | false                      |
//!
//! ## Algorithm
//!
//! 1. Warn (never fail) when samples leave [-1, 1].
//! 2. Reflect-pad `(n_fft - hop_size) / 2` samples per side. The STFT itself
//!    is *not* centred: frame `t` covers padded samples
//!    `[t * hop, t * hop + n_fft)`.
//! 3. One-sided STFT magnitude, `sqrt(re² + im² + 1e-9)`.
//! 4. Project through the mel basis.
//! 5. `ln(max(mel, 1e-5))`.
//!
//! The output is a pure function of (samples, config): no randomness, and the
//! cached basis/window/plan are immutable once built.

pub mod cache;
pub mod filters;

use std::sync::Arc;

use ndarray::{Array2, Array3, Axis};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MelvocError, Result};

pub use cache::MelCache;

/// Lower clamp applied before log compression.
pub const CLIP_VAL: f32 = 1e-5;

/// Added to the power spectrum before the square root.
const MAGNITUDE_EPS: f32 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelConfig {
    pub n_fft: usize,
    pub num_mels: usize,
    pub sampling_rate: u32,
    pub hop_size: usize,
    pub win_size: usize,
    pub fmin: f32,
    pub fmax: f32,
    #[serde(default)]
    pub center: bool,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            n_fft: 1024,
            num_mels: 80,
            sampling_rate: 22_050,
            hop_size: 256,
            win_size: 1024,
            fmin: 0.0,
            fmax: 8_000.0,
            center: false,
        }
    }
}

impl MelConfig {
    /// Reflect padding applied to each side before framing.
    pub fn edge_padding(&self) -> usize {
        self.n_fft.saturating_sub(self.hop_size) / 2
    }

    /// Number of STFT frames produced for `len` input samples.
    ///
    /// A zero `hop_size` is treated as 1.
    pub fn num_frames(&self, len: usize) -> usize {
        let mut padded = len + 2 * self.edge_padding();
        if self.center {
            padded += 2 * (self.n_fft / 2);
        }
        if padded < self.n_fft {
            0
        } else {
            1 + (padded - self.n_fft) / self.hop_size.max(1)
        }
    }
}

/// Log-compressed mel features, shape `(num_mels, frames)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogram(Array2<f32>);

impl MelSpectrogram {
    pub fn new(data: Array2<f32>) -> Self {
        Self(data)
    }

    pub fn num_mels(&self) -> usize {
        self.0.nrows()
    }

    pub fn frames(&self) -> usize {
        self.0.ncols()
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.0
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.0
    }

    /// Add a unit batch axis: `(1, num_mels, frames)`.
    pub fn to_batch(&self) -> Array3<f32> {
        self.0.clone().insert_axis(Axis(0))
    }
}

/// Waveform → log-mel converter bound to one [`MelConfig`].
#[derive(Debug, Clone)]
pub struct MelExtractor {
    config: MelConfig,
    cache: Arc<MelCache>,
}

impl MelExtractor {
    /// Extractor backed by the process-wide [`MelCache::global`].
    pub fn new(config: MelConfig) -> Self {
        Self::with_cache(config, MelCache::global())
    }

    /// Zero `n_fft`, `win_size` or `hop_size` are raised to 1.
    pub fn with_cache(mut config: MelConfig, cache: Arc<MelCache>) -> Self {
        config.n_fft = config.n_fft.max(1);
        config.win_size = config.win_size.max(1);
        config.hop_size = config.hop_size.max(1);
        Self { config, cache }
    }

    pub fn config(&self) -> &MelConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<MelCache> {
        &self.cache
    }

    /// Compute the log-mel spectrogram of one mono waveform.
    pub fn extract(&self, samples: &[f32]) -> MelSpectrogram {
        warn_if_clipping(samples);

        let cfg = &self.config;
        let mut padded = filters::reflect_pad(samples, cfg.edge_padding());
        if cfg.center {
            padded = filters::reflect_pad(&padded, cfg.n_fft / 2);
        }

        let n_fft = cfg.n_fft;
        let n_freqs = n_fft / 2 + 1;
        let n_frames = cfg.num_frames(samples.len());

        let basis = self.cache.mel_basis(cfg);
        let window = self.cache.window(cfg.win_size, n_fft);
        let fft = self.cache.fft_plan(n_fft);

        let mut magnitude = Array2::<f32>::zeros((n_freqs, n_frames));
        let mut fft_buf = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); fft.get_inplace_scratch_len()];

        for frame in 0..n_frames {
            let start = frame * cfg.hop_size;
            let frame_samples = &padded[start..start + n_fft];
            for ((slot, &s), &w) in fft_buf.iter_mut().zip(frame_samples).zip(window.iter()) {
                *slot = Complex::new(s * w, 0.0);
            }
            fft.process_with_scratch(&mut fft_buf, &mut scratch);

            for (k, bin) in fft_buf.iter().take(n_freqs).enumerate() {
                magnitude[[k, frame]] = (bin.norm_sqr() + MAGNITUDE_EPS).sqrt();
            }
        }

        let mut mel = basis.dot(&magnitude);
        mel.mapv_inplace(|v| v.max(CLIP_VAL).ln());
        MelSpectrogram::new(mel)
    }

    /// Extract a batch of equal-length waveforms into `(batch, num_mels, frames)`.
    ///
    /// # Errors
    /// `MelvocError::Shape` when the batch is empty or lengths differ.
    pub fn extract_batch(&self, batch: &[Vec<f32>]) -> Result<Array3<f32>> {
        let Some(first) = batch.first() else {
            return Err(MelvocError::Shape("empty batch".into()));
        };
        let len = first.len();
        if let Some(bad) = batch.iter().position(|w| w.len() != len) {
            return Err(MelvocError::Shape(format!(
                "batch item {bad} has {} samples, expected {len}",
                batch[bad].len()
            )));
        }

        let frames = self.config.num_frames(len);
        let mut out = Array3::<f32>::zeros((batch.len(), self.config.num_mels, frames));
        for (i, wav) in batch.iter().enumerate() {
            out.index_axis_mut(Axis(0), i)
                .assign(self.extract(wav).as_array());
        }
        Ok(out)
    }
}

fn warn_if_clipping(samples: &[f32]) {
    let (min, max) = samples
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });
    if min < -1.0 {
        warn!(min, "waveform below -1.0");
    }
    if max > 1.0 {
        warn!(max, "waveform above 1.0");
    }
}
