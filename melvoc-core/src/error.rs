use std::path::PathBuf;

use thiserror::Error;

/// All errors produced by melvoc-core.
#[derive(Debug, Error)]
pub enum MelvocError {
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable waveform {path:?}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("unreadable mel array {path:?}: {reason}")]
    MelFile { path: PathBuf, reason: String },

    #[error("shape error: {0}")]
    Shape(String),

    #[error("generator error: {0}")]
    Generator(String),

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("failed on {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: Box<MelvocError>,
    },

    #[error("checkpoint not found: {path}")]
    CheckpointNotFound { path: PathBuf },
}

impl MelvocError {
    /// Attach the offending path to an `std::io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Tag an error raised while processing `path` with that path.
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, MelvocError>;
