//! Run configuration (JSON), read once at startup.
//!
//! Unknown keys are ignored so the same file can also carry generator
//! hyper-parameters that this crate never looks at.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::corpus::CorpusTree;
use crate::error::{MelvocError, Result};
use crate::mel::MelConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocoderConfig {
    pub n_fft: usize,
    pub num_mels: usize,
    pub sampling_rate: u32,
    pub hop_size: usize,
    pub win_size: usize,
    pub fmin: f32,
    pub fmax: f32,
    /// Upper bound for the loss spectrogram; `None` reuses `fmax`.
    #[serde(default)]
    pub fmax_for_loss: Option<f32>,
    pub segment_size: usize,
    pub seed: u64,
    /// Fraction of the shuffled corpus held out for validation, in [0, 1].
    pub num_validation: f64,
    pub base_pth: Vec<PathBuf>,
    pub cls_pth: CorpusTree,
    #[serde(default = "default_n_cache_reuse")]
    pub n_cache_reuse: usize,
    #[serde(default)]
    pub fine_tuning: bool,
    #[serde(default)]
    pub base_mels_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub split: bool,
    #[serde(default = "default_true")]
    pub shuffle: bool,
}

fn default_n_cache_reuse() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl VocoderConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    /// `MelvocError::Config` for syntax errors, missing required keys and
    /// values rejected by [`validate`](Self::validate).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MelvocError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| MelvocError::io(path, e))?;
        Self::from_json_str(&json)
            .map_err(|e| MelvocError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        let nyquist = self.sampling_rate as f32 / 2.0;
        let fail = |msg: String| Err(MelvocError::Config(msg));

        if self.sampling_rate == 0 {
            return fail("sampling_rate must be positive".into());
        }
        if self.n_fft == 0 || self.hop_size == 0 || self.num_mels == 0 {
            return fail("n_fft, hop_size and num_mels must be positive".into());
        }
        if self.win_size == 0 || self.win_size > self.n_fft {
            return fail(format!(
                "win_size {} must be in 1..={}",
                self.win_size, self.n_fft
            ));
        }
        if !(self.fmin >= 0.0 && self.fmin < self.fmax && self.fmax <= nyquist) {
            return fail(format!(
                "need 0 <= fmin < fmax <= {nyquist}, got fmin={} fmax={}",
                self.fmin, self.fmax
            ));
        }
        if let Some(loss) = self.fmax_for_loss {
            if !(loss > self.fmin && loss <= nyquist) {
                return fail(format!(
                    "fmax_for_loss {loss} must be in ({}, {nyquist}]",
                    self.fmin
                ));
            }
        }
        if self.segment_size == 0 {
            return fail("segment_size must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.num_validation) {
            return fail(format!(
                "num_validation {} must be in [0, 1]",
                self.num_validation
            ));
        }
        if self.base_pth.is_empty() {
            return fail("base_pth must list at least one directory".into());
        }
        if self.fine_tuning && self.base_mels_path.is_none() {
            return fail("fine_tuning requires base_mels_path".into());
        }
        Ok(())
    }

    /// Frontend parameters for conditioning features.
    pub fn mel_config(&self) -> MelConfig {
        MelConfig {
            n_fft: self.n_fft,
            num_mels: self.num_mels,
            sampling_rate: self.sampling_rate,
            hop_size: self.hop_size,
            win_size: self.win_size,
            fmin: self.fmin,
            fmax: self.fmax,
            center: false,
        }
    }

    /// Frontend parameters for the loss spectrogram.
    pub fn loss_mel_config(&self) -> MelConfig {
        MelConfig {
            fmax: self.fmax_for_loss.unwrap_or(self.fmax),
            ..self.mel_config()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusNode;

    const SAMPLE: &str = r#"{
        "resblock": "1",
        "upsample_rates": [8, 8, 2, 2],
        "segment_size": 8192,
        "num_mels": 80,
        "n_fft": 1024,
        "hop_size": 256,
        "win_size": 1024,
        "sampling_rate": 22050,
        "fmin": 0,
        "fmax": 8000,
        "fmax_for_loss": null,
        "seed": 1234,
        "num_validation": 0.1,
        "base_pth": ["/data/"],
        "cls_pth": {"speech": {"clean": ["p225", "p226"]}, "music": ["piano"]}
    }"#;

    #[test]
    fn parses_a_full_config() {
        let cfg = VocoderConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(cfg.segment_size, 8192);
        assert_eq!(cfg.seed, 1234);
        assert_eq!(cfg.n_cache_reuse, 1);
        assert!(cfg.split && cfg.shuffle && !cfg.fine_tuning);
        assert_eq!(cfg.fmax_for_loss, None);
        assert!(matches!(cfg.cls_pth["speech"], CorpusNode::Branch(_)));
        assert_eq!(
            cfg.cls_pth["music"],
            CorpusNode::Leaf(vec!["piano".to_string()])
        );
    }

    #[test]
    fn derived_mel_configs() {
        let mut cfg = VocoderConfig::from_json_str(SAMPLE).unwrap();
        let mel = cfg.mel_config();
        assert_eq!(mel, MelConfig::default());
        assert_eq!(cfg.loss_mel_config(), mel);

        cfg.fmax_for_loss = Some(11_025.0);
        assert_eq!(cfg.loss_mel_config().fmax, 11_025.0);
        assert_eq!(cfg.loss_mel_config().n_fft, 1024);
    }

    #[test]
    fn missing_key_names_the_key() {
        let json = SAMPLE.replace(r#""hop_size": 256,"#, "");
        let err = VocoderConfig::from_json_str(&json).unwrap_err();
        match err {
            MelvocError::Config(msg) => assert!(msg.contains("hop_size"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_invalid_values() {
        for (from, to) in [
            (r#""fmax": 8000"#, r#""fmax": 20000"#),
            (r#""win_size": 1024"#, r#""win_size": 2048"#),
            (r#""num_validation": 0.1"#, r#""num_validation": 1.5"#),
            (r#""base_pth": ["/data/"]"#, r#""base_pth": []"#),
            (r#""hop_size": 256"#, r#""hop_size": 0"#),
        ] {
            let json = SAMPLE.replace(from, to);
            assert!(
                matches!(
                    VocoderConfig::from_json_str(&json),
                    Err(MelvocError::Config(_))
                ),
                "accepted {to}"
            );
        }
    }

    #[test]
    fn fine_tuning_needs_mel_dir() {
        let json = SAMPLE.replace(r#""seed": 1234,"#, r#""seed": 1234, "fine_tuning": true,"#);
        assert!(VocoderConfig::from_json_str(&json).is_err());

        let json = SAMPLE.replace(
            r#""seed": 1234,"#,
            r#""seed": 1234, "fine_tuning": true, "base_mels_path": "/mels","#,
        );
        let cfg = VocoderConfig::from_json_str(&json).unwrap();
        assert_eq!(cfg.base_mels_path, Some(PathBuf::from("/mels")));
    }

    #[test]
    fn from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, SAMPLE).unwrap();
        assert!(VocoderConfig::from_file(&path).is_ok());

        let missing = dir.path().join("nope.json");
        match VocoderConfig::from_file(&missing).unwrap_err() {
            MelvocError::Io { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }
}
