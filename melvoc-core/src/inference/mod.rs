//! Vocoder inference: waveform in, regenerated waveform out.
//!
//! The `Generator` trait decouples the driver from any specific backend
//! (silence stub, ONNX export, ...). `&mut self` on `generate` lets backends
//! keep sessions and scratch buffers; all mutation is serialised through
//! `GeneratorHandle`'s `parking_lot::Mutex`.
//!
//! ## Per-file stages
//!
//! ```text
//! load_wav → / MAX_WAV_VALUE → resample to sampling_rate
//!          → [SegmentPolicy::RandomSegment: crop to segment_size]
//!          → MelExtractor → Generator::generate → write_wav_i16
//!          → <output_dir>/<stem>_generated.wav
//! ```

pub mod checkpoint;
pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::{OnnxGenerator, OnnxGeneratorConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{info, warn};

use crate::audio::{write_wav_i16, AudioBuffer};
use crate::config::VocoderConfig;
use crate::dataset::SegmentSampler;
use crate::error::{MelvocError, Result};
use crate::mel::{MelExtractor, MelSpectrogram};

/// Suffix appended to the input stem for generated files.
pub const OUTPUT_SUFFIX: &str = "_generated";

/// Contract for mel → waveform backends.
pub trait Generator: Send + 'static {
    /// One-time load of weights and sessions. Called before the first
    /// `generate`.
    ///
    /// # Errors
    /// Returns an error if the checkpoint is missing or corrupt.
    fn warm_up(&mut self) -> Result<()>;

    /// Synthesize a waveform (normalised to [-1, 1]) from `(num_mels, frames)`
    /// features.
    fn generate(&mut self, mel: &MelSpectrogram) -> Result<Vec<f32>>;
}

/// Thread-safe reference-counted handle to any `Generator` implementor.
#[derive(Clone)]
pub struct GeneratorHandle(pub Arc<Mutex<dyn Generator>>);

impl GeneratorHandle {
    pub fn new<G: Generator>(generator: G) -> Self {
        Self(Arc::new(Mutex::new(generator)))
    }
}

impl std::fmt::Debug for GeneratorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorHandle").finish_non_exhaustive()
    }
}

/// What to do with inputs longer than `segment_size`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SegmentPolicy {
    /// Vocode the whole file.
    #[default]
    FullLength,
    /// Vocode one random `segment_size` window, drawn from the driver's RNG.
    /// Shorter inputs are used whole.
    RandomSegment,
}

#[derive(Debug, Clone, Default)]
pub struct InferenceOptions {
    pub segment_policy: SegmentPolicy,
}

/// Counters for one driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceStats {
    pub files: usize,
    pub samples_written: usize,
    pub generation_time: Duration,
}

pub struct InferenceDriver<R: Rng = StdRng> {
    sampling_rate: u32,
    sampler: SegmentSampler,
    extractor: MelExtractor,
    generator: GeneratorHandle,
    options: InferenceOptions,
    rng: R,
    stats: InferenceStats,
}

impl<R: Rng> InferenceDriver<R> {
    pub fn new(
        config: &VocoderConfig,
        generator: GeneratorHandle,
        options: InferenceOptions,
        rng: R,
    ) -> Self {
        Self::with_extractor(
            config,
            MelExtractor::new(config.mel_config()),
            generator,
            options,
            rng,
        )
    }

    pub fn with_extractor(
        config: &VocoderConfig,
        extractor: MelExtractor,
        generator: GeneratorHandle,
        options: InferenceOptions,
        rng: R,
    ) -> Self {
        if options.segment_policy == SegmentPolicy::RandomSegment {
            warn!(
                segment_size = config.segment_size,
                "random segment policy: long inputs are cropped before vocoding"
            );
        }
        Self {
            sampling_rate: config.sampling_rate,
            sampler: SegmentSampler::new(config.segment_size, config.hop_size),
            extractor,
            generator,
            options,
            rng,
            stats: InferenceStats::default(),
        }
    }

    /// Load the generator's weights.
    pub fn warm_up(&self) -> Result<()> {
        info!("warming up generator");
        self.generator.0.lock().warm_up()
    }

    pub fn stats(&self) -> InferenceStats {
        self.stats
    }

    /// Vocode an in-memory buffer, returning normalised samples at the
    /// configured sample rate.
    pub fn synthesize(&mut self, audio: AudioBuffer) -> Result<Vec<f32>> {
        let audio = audio.resampled(self.sampling_rate);
        let samples = match self.options.segment_policy {
            SegmentPolicy::RandomSegment if audio.len() >= self.sampler.segment_size() => {
                self.sampler.sample_audio(&audio.samples, &mut self.rng)
            }
            _ => audio.samples,
        };

        let mel = self.extractor.extract(&samples);
        let started = Instant::now();
        let generated = self.generator.0.lock().generate(&mel)?;
        let elapsed = started.elapsed();
        self.stats.generation_time += elapsed;

        info!(
            frames = mel.frames(),
            samples = generated.len(),
            elapsed_ms = elapsed.as_secs_f64() * 1_000.0,
            "generated waveform"
        );
        Ok(generated)
    }

    /// Vocode one file into `<output_dir>/<stem>_generated.wav`.
    pub fn process_file(&mut self, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let audio = AudioBuffer::load(input)?;
        let generated = self.synthesize(audio).map_err(|e| e.in_file(input))?;
        let output = output_path(output_dir, input);
        write_wav_i16(&output, &generated, self.sampling_rate)?;

        self.stats.files += 1;
        self.stats.samples_written += generated.len();
        info!(input = %input.display(), output = %output.display(), "wrote output");
        Ok(output)
    }

    /// Vocode every file directly inside `input_dir` in name order.
    ///
    /// Stops at the first failing file; the error names it.
    pub fn process_dir(&mut self, input_dir: &Path, output_dir: &Path) -> Result<InferenceStats> {
        fs::create_dir_all(output_dir).map_err(|e| MelvocError::io(output_dir, e))?;

        let mut inputs = Vec::new();
        for entry in fs::read_dir(input_dir).map_err(|e| MelvocError::io(input_dir, e))? {
            let path = entry.map_err(|e| MelvocError::io(input_dir, e))?.path();
            if path.is_file() {
                inputs.push(path);
            }
        }
        inputs.sort();

        for input in &inputs {
            self.process_file(input, output_dir)?;
        }

        info!(
            files = self.stats.files,
            samples = self.stats.samples_written,
            generation_ms = self.stats.generation_time.as_secs_f64() * 1_000.0,
            "inference complete"
        );
        Ok(self.stats)
    }
}

/// `<output_dir>/<input stem>_generated.wav`
pub fn output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    output_dir.join(format!("{stem}{OUTPUT_SUFFIX}.wav"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mel::MelCache;
    use rand::SeedableRng;

    /// Echoes the frame count back as a ramp so tests can see what was vocoded.
    struct FrameEcho {
        hop: usize,
        seen_frames: Arc<Mutex<Vec<usize>>>,
    }

    impl Generator for FrameEcho {
        fn warm_up(&mut self) -> Result<()> {
            Ok(())
        }

        fn generate(&mut self, mel: &MelSpectrogram) -> Result<Vec<f32>> {
            self.seen_frames.lock().push(mel.frames());
            Ok(vec![0.25; mel.frames() * self.hop])
        }
    }

    struct Failing;

    impl Generator for Failing {
        fn warm_up(&mut self) -> Result<()> {
            Ok(())
        }

        fn generate(&mut self, _mel: &MelSpectrogram) -> Result<Vec<f32>> {
            Err(MelvocError::Generator("boom".into()))
        }
    }

    fn config() -> VocoderConfig {
        VocoderConfig::from_json_str(
            r#"{"n_fft": 1024, "num_mels": 80, "sampling_rate": 22050, "hop_size": 256,
                "win_size": 1024, "fmin": 0, "fmax": 8000, "segment_size": 8192,
                "seed": 1234, "num_validation": 0.1, "base_pth": ["/data"],
                "cls_pth": {}}"#,
        )
        .unwrap()
    }

    fn driver(
        policy: SegmentPolicy,
    ) -> (InferenceDriver<StdRng>, Arc<Mutex<Vec<usize>>>) {
        let cfg = config();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let generator = GeneratorHandle::new(FrameEcho {
            hop: cfg.hop_size,
            seen_frames: Arc::clone(&seen),
        });
        let extractor = MelExtractor::with_cache(cfg.mel_config(), Arc::new(MelCache::new()));
        let driver = InferenceDriver::with_extractor(
            &cfg,
            extractor,
            generator,
            InferenceOptions {
                segment_policy: policy,
            },
            StdRng::seed_from_u64(cfg.seed),
        );
        (driver, seen)
    }

    #[test]
    fn output_name_appends_suffix() {
        assert_eq!(
            output_path(Path::new("/out"), Path::new("/in/LJ001-0001.wav")),
            PathBuf::from("/out/LJ001-0001_generated.wav")
        );
    }

    #[test]
    fn full_length_policy_keeps_all_frames() {
        let (mut d, seen) = driver(SegmentPolicy::FullLength);
        let out = d
            .synthesize(AudioBuffer::new(vec![0.0; 20_480], 22_050))
            .unwrap();
        assert_eq!(seen.lock().as_slice(), &[80]);
        assert_eq!(out.len(), 80 * 256);
    }

    #[test]
    fn random_segment_policy_crops_long_inputs_only() {
        let (mut d, seen) = driver(SegmentPolicy::RandomSegment);
        d.synthesize(AudioBuffer::new(vec![0.0; 20_480], 22_050))
            .unwrap();
        d.synthesize(AudioBuffer::new(vec![0.0; 4_096], 22_050))
            .unwrap();
        assert_eq!(seen.lock().as_slice(), &[32, 16]);
    }

    #[test]
    fn input_is_resampled_before_features() {
        let (mut d, seen) = driver(SegmentPolicy::FullLength);
        d.synthesize(AudioBuffer::new(vec![0.0; 40_960], 44_100))
            .unwrap();
        assert_eq!(seen.lock().as_slice(), &[80]);
    }

    #[test]
    fn process_dir_writes_one_file_per_input() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let out_dir = output.path().join("generated_files");
        for name in ["b.wav", "a.wav"] {
            write_wav_i16(input.path().join(name), &vec![0.1; 5_120], 22_050).unwrap();
        }
        std::fs::create_dir(input.path().join("subdir")).unwrap();

        let (mut d, seen) = driver(SegmentPolicy::FullLength);
        let stats = d.process_dir(input.path(), &out_dir).unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(stats.samples_written, 2 * 20 * 256);
        assert_eq!(seen.lock().len(), 2);

        let (raw, sr) = crate::audio::load_wav(out_dir.join("a_generated.wav")).unwrap();
        assert_eq!(sr, 22_050);
        assert_eq!(raw.len(), 20 * 256);
        assert!(raw.iter().all(|&v| v == 8192.0));
        assert!(out_dir.join("b_generated.wav").is_file());
    }

    #[test]
    fn failures_name_the_file_and_stop_the_run() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(input.path().join("broken.wav"), b"garbage").unwrap();

        let (mut d, _) = driver(SegmentPolicy::FullLength);
        let err = d.process_dir(input.path(), output.path()).unwrap_err();
        assert!(err.to_string().contains("broken.wav"), "{err}");
        assert_eq!(d.stats().files, 0);
    }

    #[test]
    fn generator_failure_names_the_input_file() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_wav_i16(input.path().join("utt_042.wav"), &vec![0.1; 4_096], 22_050).unwrap();

        let cfg = config();
        let mut d = InferenceDriver::new(
            &cfg,
            GeneratorHandle::new(Failing),
            InferenceOptions::default(),
            StdRng::seed_from_u64(0),
        );
        let err = d.process_dir(input.path(), output.path()).unwrap_err();
        assert!(err.to_string().contains("utt_042"), "{err}");
        match err {
            MelvocError::File { path, source } => {
                assert!(path.ends_with("utt_042.wav"));
                assert!(matches!(*source, MelvocError::Generator(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!output.path().join("utt_042_generated.wav").exists());
    }

    #[test]
    fn generator_errors_propagate() {
        let cfg = config();
        let mut d = InferenceDriver::new(
            &cfg,
            GeneratorHandle::new(Failing),
            InferenceOptions::default(),
            StdRng::seed_from_u64(0),
        );
        d.warm_up().unwrap();
        let err = d
            .synthesize(AudioBuffer::new(vec![0.0; 2_048], 22_050))
            .unwrap_err();
        assert!(matches!(err, MelvocError::Generator(_)));
    }
}
