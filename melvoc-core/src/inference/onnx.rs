//! ONNX generator backend via the `ort` crate.
//!
//! Expects a single-graph generator export:
//! - input  `[1, num_mels, frames]` f32 log-mel features
//! - output `[1, 1, frames * hop_size]` (or any shape with that many elements)
//!   waveform in [-1, 1]
//!
//! Input and output names are read from the graph at warm-up, so exports that
//! use `mel`/`audio`, `x`/`y` or the positional `input.1` naming all work.

use std::path::PathBuf;

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::{Session, SessionInputValue};
use ort::{ep, value::Value};
use tracing::{debug, info};

use crate::error::{MelvocError, Result};
use crate::inference::checkpoint::ensure_checkpoint;
use crate::inference::Generator;
use crate::mel::MelSpectrogram;

#[derive(Debug, Clone)]
pub struct OnnxGeneratorConfig {
    pub model_path: PathBuf,
    pub intra_threads: usize,
}

impl OnnxGeneratorConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        let logical_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            model_path: model_path.into(),
            intra_threads: logical_cores.clamp(1, 12),
        }
    }
}

fn onnx_err(e: impl std::fmt::Display) -> MelvocError {
    MelvocError::OnnxSession(e.to_string())
}

fn create_session(config: &OnnxGeneratorConfig) -> Result<Session> {
    let builder = SessionBuilder::new()
        .map_err(onnx_err)?
        .with_intra_threads(config.intra_threads)
        .map_err(onnx_err)?
        .with_optimization_level(GraphOptimizationLevel::All)
        .map_err(onnx_err)?
        .with_execution_providers([ep::CPU::default().build()])
        .map_err(onnx_err)?;
    info!(
        intra_threads = config.intra_threads,
        "ONNX session threading configured"
    );

    builder
        .commit_from_file(&config.model_path)
        .map_err(onnx_err)
}

pub struct OnnxGenerator {
    config: OnnxGeneratorConfig,
    session: Option<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxGenerator {
    pub fn new(config: OnnxGeneratorConfig) -> Self {
        Self {
            config,
            session: None,
            input_name: String::new(),
            output_name: String::new(),
        }
    }
}

impl Generator for OnnxGenerator {
    fn warm_up(&mut self) -> Result<()> {
        ensure_checkpoint(&self.config.model_path)?;
        info!("loading generator from {:?}", self.config.model_path);
        let session = create_session(&self.config)?;

        self.input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| MelvocError::OnnxSession("generator graph has no inputs".into()))?;
        self.output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| MelvocError::OnnxSession("generator graph has no outputs".into()))?;
        info!(
            input = %self.input_name,
            output = %self.output_name,
            "generator session ready"
        );

        self.session = Some(session);
        Ok(())
    }

    fn generate(&mut self, mel: &MelSpectrogram) -> Result<Vec<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| MelvocError::OnnxSession("model not loaded, call warm_up()".into()))?;

        let mel_val = Value::from_array(mel.to_batch()).map_err(onnx_err)?;
        let inputs: Vec<(String, SessionInputValue<'_>)> =
            vec![(self.input_name.clone(), mel_val.into())];

        let outputs = session.run(inputs).map_err(onnx_err)?;
        let audio = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| MelvocError::OnnxSession(format!("missing output {}", self.output_name)))?;
        let (shape, data) = audio.try_extract_tensor::<f32>().map_err(onnx_err)?;
        debug!(?shape, frames = mel.frames(), "generator output");

        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_before_warm_up_is_an_error() {
        let mut g = OnnxGenerator::new(OnnxGeneratorConfig::new("/nonexistent/g.onnx"));
        let mel = MelSpectrogram::new(ndarray::Array2::zeros((80, 4)));
        assert!(matches!(g.generate(&mel), Err(MelvocError::OnnxSession(_))));
    }

    #[test]
    fn missing_model_reports_checkpoint_path() {
        let mut g = OnnxGenerator::new(OnnxGeneratorConfig::new("/nonexistent/g.onnx"));
        assert!(matches!(
            g.warm_up(),
            Err(MelvocError::CheckpointNotFound { .. })
        ));
    }
}
