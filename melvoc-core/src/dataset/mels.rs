//! Precomputed mel features stored as `.npy` arrays.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array2, ShapeBuilder};
use npyz::{NpyFile, Order};

use crate::error::{MelvocError, Result};

/// `<base_mels_path>/<audio file stem>.npy`
pub fn mel_path_for(base_mels_path: &Path, audio_path: &Path) -> PathBuf {
    let stem = audio_path.file_stem().unwrap_or_default();
    let mut name = stem.to_os_string();
    name.push(".npy");
    base_mels_path.join(name)
}

/// Load a `(num_mels, frames)` or `(1, num_mels, frames)` array as f32.
///
/// Both `<f4` and `<f8` payloads and either memory order are accepted.
pub fn load_mel_npy(path: &Path) -> Result<Array2<f32>> {
    let bad = |reason: String| MelvocError::MelFile {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| MelvocError::io(path, e))?;
    let header = NpyFile::new(&bytes[..]).map_err(|e| bad(e.to_string()))?;
    let shape = header.shape().to_vec();
    let fortran = header.order() == Order::Fortran;

    let data: Vec<f32> = match header.into_vec::<f32>() {
        Ok(v) => v,
        Err(_) => NpyFile::new(&bytes[..])
            .and_then(|f| f.into_vec::<f64>())
            .map_err(|e| bad(format!("expected f32 or f64 data: {e}")))?
            .into_iter()
            .map(|v| v as f32)
            .collect(),
    };

    let (rows, cols) = match shape.as_slice() {
        [m, t] => (*m as usize, *t as usize),
        [1, m, t] => (*m as usize, *t as usize),
        other => return Err(bad(format!("unsupported mel shape {other:?}"))),
    };

    let array = if fortran {
        Array2::from_shape_vec((rows, cols).f(), data)
    } else {
        Array2::from_shape_vec((rows, cols), data)
    };
    array.map_err(|e| bad(e.to_string()))
}
