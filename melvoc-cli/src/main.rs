//! melvoc command-line host.
//!
//! ```text
//! melvoc infer --checkpoint_file <path> [--input_wavs_dir test_files]
//!              [--output_dir generated_files] [--config <path>] [--random-segment]
//! melvoc index --config <path> --output_dir <dir>
//! ```
//!
//! `--checkpoint_file` may name a directory, in which case the latest `g_*`
//! checkpoint inside it is used. The config defaults to `config.json` beside
//! the checkpoint.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use melvoc_core::corpus::{dataset_filelist, write_filelist};
use melvoc_core::inference::checkpoint::{config_beside, ensure_checkpoint, scan_checkpoint};
use melvoc_core::{
    GeneratorHandle, InferenceDriver, InferenceOptions, SegmentPolicy, VocoderConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

const USAGE: &str = "\
Usage:
  melvoc infer --checkpoint_file <path> [--input_wavs_dir <dir>] [--output_dir <dir>]
               [--config <file>] [--random-segment]
  melvoc index --config <file> --output_dir <dir>";

const GENERATOR_PREFIX: &str = "g_";

#[derive(Debug, PartialEq)]
enum Command {
    Infer(InferArgs),
    Index(IndexArgs),
    Help,
}

#[derive(Debug, PartialEq)]
struct InferArgs {
    checkpoint_file: PathBuf,
    input_wavs_dir: PathBuf,
    output_dir: PathBuf,
    config: Option<PathBuf>,
    random_segment: bool,
}

#[derive(Debug, PartialEq)]
struct IndexArgs {
    config: PathBuf,
    output_dir: PathBuf,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Command> {
    let mut it = args.into_iter();
    let Some(sub) = it.next() else {
        bail!("missing subcommand\n{USAGE}");
    };
    if sub == "--help" || sub == "-h" {
        return Ok(Command::Help);
    }

    let mut checkpoint_file = None;
    let mut input_wavs_dir = PathBuf::from("test_files");
    let mut output_dir = None;
    let mut config = None;
    let mut random_segment = false;

    while let Some(arg) = it.next() {
        let mut value = |flag: &str| {
            it.next()
                .map(PathBuf::from)
                .with_context(|| format!("missing value for {flag}"))
        };
        match arg.as_str() {
            "--checkpoint_file" => checkpoint_file = Some(value(&arg)?),
            "--input_wavs_dir" => input_wavs_dir = value(&arg)?,
            "--output_dir" => output_dir = Some(value(&arg)?),
            "--config" => config = Some(value(&arg)?),
            "--random-segment" => random_segment = true,
            "--help" | "-h" => return Ok(Command::Help),
            other => bail!("unknown argument: {other}\n{USAGE}"),
        }
    }

    match sub.as_str() {
        "infer" => Ok(Command::Infer(InferArgs {
            checkpoint_file: checkpoint_file.context("--checkpoint_file is required")?,
            input_wavs_dir,
            output_dir: output_dir.unwrap_or_else(|| PathBuf::from("generated_files")),
            config,
            random_segment,
        })),
        "index" => Ok(Command::Index(IndexArgs {
            config: config.context("--config is required")?,
            output_dir: output_dir.context("--output_dir is required")?,
        })),
        other => bail!("unknown subcommand: {other}\n{USAGE}"),
    }
}

fn resolve_checkpoint(path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        return scan_checkpoint(path, GENERATOR_PREFIX)?.with_context(|| {
            format!("no {GENERATOR_PREFIX}* checkpoint in {}", path.display())
        });
    }
    ensure_checkpoint(path)?;
    Ok(path.to_path_buf())
}

#[cfg(feature = "onnx")]
fn load_generator(checkpoint: &Path, _config: &VocoderConfig) -> GeneratorHandle {
    use melvoc_core::{OnnxGenerator, OnnxGeneratorConfig};
    GeneratorHandle::new(OnnxGenerator::new(OnnxGeneratorConfig::new(checkpoint)))
}

#[cfg(not(feature = "onnx"))]
fn load_generator(checkpoint: &Path, config: &VocoderConfig) -> GeneratorHandle {
    tracing::warn!(
        checkpoint = %checkpoint.display(),
        "built without the 'onnx' feature; writing silence from the stub generator"
    );
    GeneratorHandle::new(melvoc_core::StubGenerator::new(config.hop_size))
}

fn run_infer(args: InferArgs) -> Result<()> {
    let checkpoint = resolve_checkpoint(&args.checkpoint_file)?;
    let config_path = args.config.unwrap_or_else(|| config_beside(&checkpoint));
    let config = VocoderConfig::from_file(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    info!(checkpoint = %checkpoint.display(), config = %config_path.display(), "infer");

    let options = InferenceOptions {
        segment_policy: if args.random_segment {
            SegmentPolicy::RandomSegment
        } else {
            SegmentPolicy::FullLength
        },
    };
    let generator = load_generator(&checkpoint, &config);
    let mut driver = InferenceDriver::new(
        &config,
        generator,
        options,
        StdRng::seed_from_u64(config.seed),
    );
    driver.warm_up().context("generator warm-up failed")?;

    let stats = driver
        .process_dir(&args.input_wavs_dir, &args.output_dir)
        .context("inference failed")?;
    println!(
        "wrote {} file(s) to {}",
        stats.files,
        args.output_dir.display()
    );
    Ok(())
}

fn run_index(args: IndexArgs) -> Result<()> {
    let config = VocoderConfig::from_file(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (training, validation) = dataset_filelist(&config, &mut rng)?;

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    write_filelist(args.output_dir.join("training.txt"), &training)?;
    write_filelist(args.output_dir.join("validation.txt"), &validation)?;
    println!(
        "indexed {} training / {} validation file(s)",
        training.len(),
        validation.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match parse_args(std::env::args().skip(1))? {
        Command::Help => {
            println!("{USAGE}");
            Ok(())
        }
        Command::Infer(args) => run_infer(args),
        Command::Index(args) => run_index(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn infer_defaults() {
        let cmd = parse_args(args(&["infer", "--checkpoint_file", "cp/g_00100000"])).unwrap();
        assert_eq!(
            cmd,
            Command::Infer(InferArgs {
                checkpoint_file: PathBuf::from("cp/g_00100000"),
                input_wavs_dir: PathBuf::from("test_files"),
                output_dir: PathBuf::from("generated_files"),
                config: None,
                random_segment: false,
            })
        );
    }

    #[test]
    fn infer_requires_checkpoint() {
        assert!(parse_args(args(&["infer"])).is_err());
    }

    #[test]
    fn index_requires_output_dir() {
        assert!(parse_args(args(&["index", "--config", "c.json"])).is_err());
        let cmd = parse_args(args(&["index", "--config", "c.json", "--output_dir", "lists"]))
            .unwrap();
        assert_eq!(
            cmd,
            Command::Index(IndexArgs {
                config: PathBuf::from("c.json"),
                output_dir: PathBuf::from("lists"),
            })
        );
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(parse_args(args(&["infer", "--bogus"])).is_err());
        assert!(parse_args(args(&["train"])).is_err());
    }

    #[test]
    fn checkpoint_directory_resolves_to_latest_generator() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["g_00000100", "g_00002000", "do_00002000"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        assert_eq!(
            resolve_checkpoint(dir.path()).unwrap(),
            dir.path().join("g_00002000")
        );
        assert!(resolve_checkpoint(&dir.path().join("missing")).is_err());
    }
}
