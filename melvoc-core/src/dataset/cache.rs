//! Single-slot decoded-waveform cache.
//!
//! Holds exactly one decoded (and resampled) waveform. A miss decodes from
//! disk and arms the slot for `n_cache_reuse` further reads; each following
//! read is served from the slot and consumes one reuse, regardless of which
//! file was asked for. With `n_cache_reuse = 0` every read decodes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::audio::AudioBuffer;
use crate::error::Result;

#[derive(Debug)]
pub struct WaveformCache {
    n_cache_reuse: usize,
    target_rate: u32,
    slot: Option<(PathBuf, Arc<[f32]>)>,
    remaining: usize,
}

impl WaveformCache {
    pub fn new(n_cache_reuse: usize, target_rate: u32) -> Self {
        Self {
            n_cache_reuse,
            target_rate,
            slot: None,
            remaining: 0,
        }
    }

    /// Waveform for `path`, normalised and at the target rate.
    ///
    /// # Errors
    /// Propagates decode failures; the slot is left untouched in that case.
    pub fn get(&mut self, path: &Path) -> Result<Arc<[f32]>> {
        if self.remaining > 0 {
            if let Some((source, samples)) = &self.slot {
                self.remaining -= 1;
                debug!(
                    requested = %path.display(),
                    cached = %source.display(),
                    remaining = self.remaining,
                    "waveform cache hit"
                );
                return Ok(Arc::clone(samples));
            }
        }

        let audio = AudioBuffer::load(path)?.resampled(self.target_rate);
        let samples: Arc<[f32]> = audio.samples.into();
        self.slot = Some((path.to_path_buf(), Arc::clone(&samples)));
        self.remaining = self.n_cache_reuse;
        debug!(path = %path.display(), samples = samples.len(), "waveform cache miss");
        Ok(samples)
    }

    /// File currently held in the slot, if any.
    pub fn cached_path(&self) -> Option<&Path> {
        self.slot.as_ref().map(|(p, _)| p.as_path())
    }

    /// Reads left before the next decode.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}
