//! Checkpoint discovery.
//!
//! Checkpoints are opaque to this crate: a generator backend loads them. The
//! run configuration lives next to the checkpoint as `config.json`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MelvocError, Result};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// `<checkpoint dir>/config.json`
pub fn config_beside(checkpoint: &Path) -> PathBuf {
    checkpoint
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(CONFIG_FILE_NAME)
}

/// Latest checkpoint in `dir` whose file name starts with `prefix`, by
/// lexicographic order (e.g. `g_00120000` after `g_00090000`).
///
/// Returns `Ok(None)` when nothing matches.
pub fn scan_checkpoint(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    let mut matches = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| MelvocError::io(dir, e))? {
        let entry = entry.map_err(|e| MelvocError::io(dir, e))?;
        if entry.file_name().to_string_lossy().starts_with(prefix) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches.pop())
}

/// Fail early with `CheckpointNotFound` rather than deep inside a backend.
pub fn ensure_checkpoint(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MelvocError::CheckpointNotFound {
            path: path.to_path_buf(),
        })
    }
}
