//! Training corpus discovery from a nested class-path tree.
//!
//! ## Layout
//!
//! ```text
//! cls_pth = { "speech": { "clean": ["p225", "p226"] }, "music": ["piano"] }
//!
//! <base>/speech/clean/p225/*   ─┐
//! <base>/speech/clean/p226/*    ├─ direct files only, per existing leaf dir
//! <base>/music/piano/*         ─┘
//! ```
//!
//! Branches extend the path by their key; leaves name candidate
//! subdirectories. Candidates that do not exist are skipped silently; an
//! existing directory that cannot be listed is an error.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::VocoderConfig;
use crate::error::{MelvocError, Result};

/// Top level of a class-path tree.
pub type CorpusTree = BTreeMap<String, CorpusNode>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorpusNode {
    /// Names of candidate subdirectories under `<path>/<key>/`.
    Leaf(Vec<String>),
    /// Nested categories under `<path>/<key>/`.
    Branch(CorpusTree),
}

/// Enumerate every file declared by `tree` under each of `base_paths`.
///
/// Results are concatenated in base-path order; within a directory, entries
/// are sorted so a seeded shuffle downstream is reproducible.
pub fn index(base_paths: &[PathBuf], tree: &CorpusTree) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for base in base_paths {
        let before = files.len();
        walk(base, tree, &mut files)?;
        debug!(
            base = %base.display(),
            files = files.len() - before,
            "indexed base path"
        );
    }
    Ok(files)
}

fn walk(dir: &Path, tree: &CorpusTree, out: &mut Vec<PathBuf>) -> Result<()> {
    for (key, node) in tree {
        let node_dir = dir.join(key);
        match node {
            CorpusNode::Branch(children) => walk(&node_dir, children, out)?,
            CorpusNode::Leaf(subdirs) => {
                for sub in subdirs {
                    let leaf = node_dir.join(sub);
                    if leaf.is_dir() {
                        list_files(&leaf, out)?;
                    } else {
                        debug!(dir = %leaf.display(), "declared directory absent, skipping");
                    }
                }
            }
        }
    }
    Ok(())
}

fn list_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| MelvocError::io(dir, e))? {
        let path = entry.map_err(|e| MelvocError::io(dir, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    out.extend(files);
    Ok(())
}

/// Split a shuffled list into `(training, validation)`.
///
/// Training keeps the first `floor(len * (1 - num_validation))` entries and
/// validation takes the tail.
pub fn split_filelist(
    mut files: Vec<PathBuf>,
    num_validation: f64,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let keep = (files.len() as f64 * (1.0 - num_validation)).floor() as usize;
    let validation = files.split_off(keep.min(files.len()));
    (files, validation)
}

/// Index all configured base paths, shuffle once with `rng`, and split.
pub fn dataset_filelist<R: Rng + ?Sized>(
    config: &VocoderConfig,
    rng: &mut R,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files = index(&config.base_pth, &config.cls_pth)?;
    files.shuffle(rng);
    let (training, validation) = split_filelist(files, config.num_validation);
    info!(
        training = training.len(),
        validation = validation.len(),
        "corpus indexed"
    );
    Ok((training, validation))
}

/// Persist a file list, one path per line.
pub fn write_filelist(path: impl AsRef<Path>, files: &[PathBuf]) -> Result<()> {
    let path = path.as_ref();
    let io_err = |e| MelvocError::io(path, e);
    let mut out = std::io::BufWriter::new(fs::File::create(path).map_err(io_err)?);
    for file in files {
        writeln!(out, "{}", file.display()).map_err(io_err)?;
    }
    out.flush().map_err(io_err)
}

/// Read a list written by [`write_filelist`]. Blank lines are ignored.
pub fn read_filelist(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| MelvocError::io(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn tree(json: &str) -> CorpusTree {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn absent_leaf_directories_are_skipped() {
        let base = tempfile::tempdir().unwrap();
        touch(&base.path().join("a/b/x/f1"));
        touch(&base.path().join("a/b/x/f2"));

        let files = index(
            &[base.path().to_path_buf()],
            &tree(r#"{"a": {"b": ["x", "y"]}}"#),
        )
        .unwrap();

        assert_eq!(
            files,
            vec![base.path().join("a/b/x/f1"), base.path().join("a/b/x/f2")]
        );
    }

    #[test]
    fn only_direct_files_are_listed() {
        let base = tempfile::tempdir().unwrap();
        touch(&base.path().join("music/piano/one.wav"));
        touch(&base.path().join("music/piano/nested/deeper.wav"));

        let files = index(&[base.path().to_path_buf()], &tree(r#"{"music": ["piano"]}"#)).unwrap();
        assert_eq!(files, vec![base.path().join("music/piano/one.wav")]);
    }

    #[test]
    fn branches_and_bases_are_concatenated() {
        let b1 = tempfile::tempdir().unwrap();
        let b2 = tempfile::tempdir().unwrap();
        touch(&b1.path().join("speech/clean/p225/a.wav"));
        touch(&b1.path().join("music/piano/b.wav"));
        touch(&b2.path().join("speech/clean/p226/c.wav"));

        let t = tree(r#"{"speech": {"clean": ["p225", "p226"]}, "music": ["piano"]}"#);
        let files = index(&[b1.path().to_path_buf(), b2.path().to_path_buf()], &t).unwrap();

        assert_eq!(files.len(), 3);
        assert!(files.contains(&b1.path().join("speech/clean/p225/a.wav")));
        assert!(files.contains(&b1.path().join("music/piano/b.wav")));
        assert_eq!(files[2], b2.path().join("speech/clean/p226/c.wav"));
    }

    #[test]
    fn missing_base_yields_nothing() {
        let files = index(
            &[PathBuf::from("/no/such/base")],
            &tree(r#"{"a": ["b"]}"#),
        )
        .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn split_sizes_cover_the_list() {
        for n in [0usize, 1, 9, 10, 11, 99, 1000] {
            let files: Vec<PathBuf> = (0..n).map(|i| PathBuf::from(i.to_string())).collect();
            let (train, val) = split_filelist(files.clone(), 0.1);
            let expected = (n as f64 * 0.9).floor() as usize;
            assert_eq!(train.len(), expected, "n={n}");
            assert_eq!(val.len(), n - expected, "n={n}");

            let mut joined = train.clone();
            joined.extend(val.iter().cloned());
            assert_eq!(joined, files);
        }
    }

    #[test]
    fn split_extremes() {
        let files: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(i.to_string())).collect();
        let (train, val) = split_filelist(files.clone(), 0.0);
        assert_eq!((train.len(), val.len()), (5, 0));
        let (train, val) = split_filelist(files, 1.0);
        assert_eq!((train.len(), val.len()), (0, 5));
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let base = tempfile::tempdir().unwrap();
        for i in 0..20 {
            touch(&base.path().join(format!("a/x/{i:02}.wav")));
        }
        let json = format!(
            r#"{{"n_fft": 1024, "num_mels": 80, "sampling_rate": 22050, "hop_size": 256,
                "win_size": 1024, "fmin": 0, "fmax": 8000, "segment_size": 8192,
                "seed": 7, "num_validation": 0.25,
                "base_pth": [{:?}], "cls_pth": {{"a": ["x"]}}}}"#,
            base.path().display().to_string()
        );
        let cfg = VocoderConfig::from_json_str(&json).unwrap();

        let first = dataset_filelist(&cfg, &mut StdRng::seed_from_u64(cfg.seed)).unwrap();
        let second = dataset_filelist(&cfg, &mut StdRng::seed_from_u64(cfg.seed)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0.len(), 15);
        assert_eq!(first.1.len(), 5);
    }

    #[test]
    fn filelist_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training.txt");
        let files = vec![PathBuf::from("/data/a/b/x/f1"), PathBuf::from("/data/a/b/x/f2")];
        write_filelist(&path, &files).unwrap();
        assert_eq!(read_filelist(&path).unwrap(), files);
    }
}
