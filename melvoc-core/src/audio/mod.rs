//! Waveform loading, normalisation and output writing.
//!
//! Samples travel through the crate as mono `f32` in roughly [-1.0, 1.0].
//! Files are decoded into the raw int16 range first and divided by
//! [`MAX_WAV_VALUE`] afterwards, so every container flavour lands on the same
//! scale before feature extraction.

pub mod resample;

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{debug, info};

use crate::error::{MelvocError, Result};

pub use resample::{resample_spectral, resampled_len};

/// Full-scale constant for 16-bit PCM.
pub const MAX_WAV_VALUE: f32 = 32768.0;

/// A mono waveform at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Mono f32 samples, normalised to approximately [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 16000, 22050, 44100).
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build a normalised buffer from samples in the raw int16 range.
    pub fn from_raw(raw: Vec<f32>, sample_rate: u32) -> Self {
        let samples = raw.into_iter().map(|s| s / MAX_WAV_VALUE).collect();
        Self::new(samples, sample_rate)
    }

    /// Decode `path` and normalise by [`MAX_WAV_VALUE`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let (raw, sample_rate) = load_wav(path)?;
        Ok(Self::from_raw(raw, sample_rate))
    }

    /// Convert to `target_rate`. Returns `self` unchanged when rates already match.
    ///
    /// The output length is exactly `resampled_len(len, sample_rate, target_rate)`.
    pub fn resampled(self, target_rate: u32) -> Self {
        if self.sample_rate == target_rate {
            return self;
        }
        let num = resampled_len(self.samples.len(), self.sample_rate, target_rate);
        info!(
            from = self.sample_rate,
            to = target_rate,
            samples_in = self.samples.len(),
            samples_out = num,
            "resampling waveform"
        );
        let samples = resample_spectral(&self.samples, num);
        Self::new(samples, target_rate)
    }

    /// Duration of this buffer in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Read a PCM WAV file, returning mono samples in the raw int16 range and the
/// file's sample rate.
///
/// 16-bit integer files are returned verbatim. Other integer widths are
/// rescaled to 16-bit full scale and float files are multiplied by
/// [`MAX_WAV_VALUE`]. Multi-channel audio is averaged down to mono.
///
/// # Errors
/// `MelvocError::Io` when the file cannot be opened, `MelvocError::Wav` when
/// the container is malformed.
pub fn load_wav(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32)> {
    let path = path.as_ref();
    let wav_err = |source: hound::Error| match source {
        hound::Error::IoError(e) => MelvocError::io(path, e),
        other => MelvocError::Wav {
            path: path.to_path_buf(),
            source: other,
        },
    };

    let mut reader = WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let scale = 2f32.powi(16 - spec.bits_per_sample as i32);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(wav_err)?
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| v * MAX_WAV_VALUE))
            .collect::<std::result::Result<_, _>>()
            .map_err(wav_err)?,
    };

    debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        "decoded waveform"
    );

    Ok((downmix(interleaved, spec.channels), spec.sample_rate))
}

/// Average interleaved frames down to a single channel.
fn downmix(interleaved: Vec<f32>, channels: u16) -> Vec<f32> {
    let ch = channels.max(1) as usize;
    if ch == 1 {
        return interleaved;
    }
    interleaved
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Write normalised samples as 16-bit mono PCM.
///
/// Each sample is scaled by [`MAX_WAV_VALUE`] and truncated toward zero;
/// values beyond the int16 range saturate.
pub fn write_wav_i16(path: impl AsRef<Path>, samples: &[f32], sample_rate: u32) -> Result<()> {
    let path = path.as_ref();
    let wav_err = |source: hound::Error| match source {
        hound::Error::IoError(e) => MelvocError::io(path, e),
        other => MelvocError::Wav {
            path: path.to_path_buf(),
            source: other,
        },
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for &s in samples {
        writer
            .write_sample((s * MAX_WAV_VALUE) as i16)
            .map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}
