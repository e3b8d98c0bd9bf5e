//! Fixed-length training segment selection.
//!
//! Audio-only mode crops a random `segment_size` window (or right-pads with
//! zeros). Fine-tuning mode crops a random run of `ceil(segment_size / hop)`
//! precomputed mel frames together with the audio those frames cover.

use ndarray::{Array2, ArrayView2, Axis, Slice};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSampler {
    segment_size: usize,
    hop_size: usize,
}

impl SegmentSampler {
    pub fn new(segment_size: usize, hop_size: usize) -> Self {
        Self {
            segment_size,
            hop_size: hop_size.max(1),
        }
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Mel frames spanning one segment.
    pub fn frames_per_segment(&self) -> usize {
        self.segment_size.div_ceil(self.hop_size)
    }

    /// Exactly `segment_size` samples: a uniformly placed crop when the input
    /// is long enough, otherwise the input right-padded with zeros.
    pub fn sample_audio<R: Rng + ?Sized>(&self, audio: &[f32], rng: &mut R) -> Vec<f32> {
        let start = if audio.len() >= self.segment_size {
            rng.gen_range(0..=audio.len() - self.segment_size)
        } else {
            0
        };
        fit_samples(audio, start, self.segment_size)
    }

    /// Crop `mel` (`num_mels × frames`) and `audio` to one aligned segment.
    ///
    /// When the audio covers a full segment, a random frame offset `t` is
    /// drawn from `[0, frames - frames_per_segment - 1]` (clamped at zero) and
    /// the audio range `[t * hop, (t + frames_per_segment) * hop)` is taken.
    /// Otherwise the mel is fitted to `frames_per_segment` frames and the
    /// audio right-padded to `segment_size`. Missing frames/samples are zeros.
    pub fn sample_aligned<R: Rng + ?Sized>(
        &self,
        mel: &Array2<f32>,
        audio: &[f32],
        rng: &mut R,
    ) -> (Array2<f32>, Vec<f32>) {
        let frames = self.frames_per_segment();

        if audio.len() >= self.segment_size {
            let max_start = mel.ncols().saturating_sub(frames + 1);
            let start = rng.gen_range(0..=max_start);
            let mel = fit_frames(mel.view(), start, frames);
            let audio = fit_samples(audio, start * self.hop_size, frames * self.hop_size);
            (mel, audio)
        } else {
            (
                fit_frames(mel.view(), 0, frames),
                fit_samples(audio, 0, self.segment_size),
            )
        }
    }
}

/// `count` samples starting at `start`, zero-filled past the end of `audio`.
fn fit_samples(audio: &[f32], start: usize, count: usize) -> Vec<f32> {
    let mut out = vec![0.0; count];
    let available = audio.len().saturating_sub(start).min(count);
    if available > 0 {
        out[..available].copy_from_slice(&audio[start..start + available]);
    }
    out
}

/// `count` frames starting at `start`, zero-filled past the last column.
fn fit_frames(mel: ArrayView2<f32>, start: usize, count: usize) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros((mel.nrows(), count));
    let available = mel.ncols().saturating_sub(start).min(count);
    if available > 0 {
        out.slice_axis_mut(Axis(1), Slice::from(0..available))
            .assign(&mel.slice_axis(Axis(1), Slice::from(start..start + available)));
    }
    out
}
