//! `StubGenerator`: dry-run backend that returns silence.
//!
//! Produces `frames * hop_size` zero samples per call so the full
//! load → features → generate → write path can be exercised without a
//! trained network.

use tracing::debug;

use crate::error::Result;
use crate::inference::Generator;
use crate::mel::MelSpectrogram;

pub struct StubGenerator {
    hop_size: usize,
    calls: u64,
}

impl StubGenerator {
    pub fn new(hop_size: usize) -> Self {
        Self { hop_size, calls: 0 }
    }

    /// Number of `generate` calls served.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Generator for StubGenerator {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubGenerator::warm_up: no-op");
        Ok(())
    }

    fn generate(&mut self, mel: &MelSpectrogram) -> Result<Vec<f32>> {
        self.calls += 1;
        Ok(vec![0.0; mel.frames() * self.hop_size])
    }
}
