//! # melvoc-core
//!
//! Feature extraction and data assembly for a mel-conditioned neural vocoder.
//!
//! ## Architecture
//!
//! ```text
//! training:
//!   CorpusNode (config) → corpus::index → shuffle + split
//!                                            │
//!                                  MelDataset::get(index)
//!                                            │
//!            WaveformCache → load_wav → normalise → resample
//!                                            │
//!                                  SegmentSampler (random crop / pad)
//!                                            │
//!                       MelExtractor → (mel, audio, filename, mel_loss)
//!
//! inference:
//!   load_wav → normalise → resample → MelExtractor → Generator → write_wav_i16
//! ```
//!
//! Randomness is never ambient: every sampler takes an explicit `Rng`, seeded
//! once from `VocoderConfig::seed` by the caller.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod config;
pub mod corpus;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod mel;

// Convenience re-exports for downstream crates
pub use audio::{AudioBuffer, MAX_WAV_VALUE};
pub use config::VocoderConfig;
pub use corpus::CorpusNode;
pub use dataset::{DatasetExample, MelDataset};
pub use error::{MelvocError, Result};
pub use inference::stub::StubGenerator;
pub use inference::{
    Generator, GeneratorHandle, InferenceDriver, InferenceOptions, InferenceStats, SegmentPolicy,
};
pub use mel::{MelCache, MelConfig, MelExtractor, MelSpectrogram};

#[cfg(feature = "onnx")]
pub use inference::{OnnxGenerator, OnnxGeneratorConfig};
