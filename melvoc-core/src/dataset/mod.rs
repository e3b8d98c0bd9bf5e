//! Paired (mel, audio) example assembly for generator training.
//!
//! ## Per-example stages
//!
//! ```text
//! 1. files[index] → WaveformCache (decode + normalise + resample, or reuse)
//! 2a. audio mode:       SegmentSampler::sample_audio → MelExtractor (fmax)
//! 2b. fine-tuning mode: <stem>.npy → SegmentSampler::sample_aligned
//! 3. MelExtractor (fmax_for_loss) on the final audio → mel_loss
//! ```
//!
//! `split = false` (validation) skips step 2's cropping and works on the
//! whole file.

pub mod cache;
pub mod mels;
pub mod segment;

use std::path::PathBuf;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::config::VocoderConfig;
use crate::error::{MelvocError, Result};
use crate::mel::MelExtractor;

pub use cache::WaveformCache;
pub use segment::SegmentSampler;

/// Dataset behaviour knobs, usually derived from [`VocoderConfig`].
#[derive(Debug, Clone)]
pub struct DatasetSettings {
    pub segment_size: usize,
    pub hop_size: usize,
    /// Target sample rate; files at other rates are resampled on load.
    pub sampling_rate: u32,
    /// Crop/pad to a fixed segment. Disabled for validation.
    pub split: bool,
    /// Shuffle the file list once at construction.
    pub shuffle: bool,
    pub n_cache_reuse: usize,
    /// Condition on precomputed mels instead of mels derived from audio.
    pub fine_tuning: bool,
    pub base_mels_path: Option<PathBuf>,
}

impl DatasetSettings {
    pub fn from_config(config: &VocoderConfig) -> Self {
        Self {
            segment_size: config.segment_size,
            hop_size: config.hop_size,
            sampling_rate: config.sampling_rate,
            split: config.split,
            shuffle: config.shuffle,
            n_cache_reuse: config.n_cache_reuse,
            fine_tuning: config.fine_tuning,
            base_mels_path: config.base_mels_path.clone(),
        }
    }
}

/// One training example.
#[derive(Debug, Clone)]
pub struct DatasetExample {
    /// Conditioning features, `(num_mels, frames)`.
    pub mel: Array2<f32>,
    /// Waveform aligned with `mel`.
    pub audio: Vec<f32>,
    pub filename: PathBuf,
    /// Loss-target features computed from `audio` with the loss frequency bound.
    pub mel_loss: Array2<f32>,
}

pub struct MelDataset<R: Rng = StdRng> {
    files: Vec<PathBuf>,
    settings: DatasetSettings,
    extractor: MelExtractor,
    loss_extractor: MelExtractor,
    sampler: SegmentSampler,
    cache: WaveformCache,
    rng: R,
}

impl<R: Rng> MelDataset<R> {
    pub fn new(
        mut files: Vec<PathBuf>,
        settings: DatasetSettings,
        extractor: MelExtractor,
        loss_extractor: MelExtractor,
        mut rng: R,
    ) -> Self {
        if settings.shuffle {
            files.shuffle(&mut rng);
        }
        info!(
            files = files.len(),
            split = settings.split,
            fine_tuning = settings.fine_tuning,
            n_cache_reuse = settings.n_cache_reuse,
            "dataset ready"
        );
        Self {
            sampler: SegmentSampler::new(settings.segment_size, settings.hop_size),
            cache: WaveformCache::new(settings.n_cache_reuse, settings.sampling_rate),
            files,
            settings,
            extractor,
            loss_extractor,
            rng,
        }
    }

    /// Dataset over `files` using the config's frontends and the shared mel cache.
    pub fn from_config(files: Vec<PathBuf>, config: &VocoderConfig, rng: R) -> Self {
        Self::new(
            files,
            DatasetSettings::from_config(config),
            MelExtractor::new(config.mel_config()),
            MelExtractor::new(config.loss_mel_config()),
            rng,
        )
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// File order after the construction-time shuffle.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn settings(&self) -> &DatasetSettings {
        &self.settings
    }

    /// Assemble example `index`.
    ///
    /// # Errors
    /// - `MelvocError::Shape` if `index` is out of range.
    /// - `Io` / `Wav` / `MelFile` when the waveform or mel file is unreadable.
    /// - `Config` in fine-tuning mode without `base_mels_path`.
    pub fn get(&mut self, index: usize) -> Result<DatasetExample> {
        let filename = self
            .files
            .get(index)
            .cloned()
            .ok_or_else(|| {
                MelvocError::Shape(format!("index {index} out of range for {}", self.files.len()))
            })?;

        let wav = self.cache.get(&filename)?;

        let (mel, audio) = if self.settings.fine_tuning {
            let base = self.settings.base_mels_path.as_deref().ok_or_else(|| {
                MelvocError::Config("fine_tuning requires base_mels_path".into())
            })?;
            let mel = mels::load_mel_npy(&mels::mel_path_for(base, &filename))?;
            if self.settings.split {
                self.sampler.sample_aligned(&mel, &wav, &mut self.rng)
            } else {
                (mel, wav.to_vec())
            }
        } else {
            let audio = if self.settings.split {
                self.sampler.sample_audio(&wav, &mut self.rng)
            } else {
                wav.to_vec()
            };
            (self.extractor.extract(&audio).into_inner(), audio)
        };

        let mel_loss = self.loss_extractor.extract(&audio).into_inner();

        Ok(DatasetExample {
            mel,
            audio,
            filename,
            mel_loss,
        })
    }
}
