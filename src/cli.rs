use crate::error::{Error, Result};
use crate::ml::TrainOptions;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL_PATH: &str = "tidymypics-model.tar.gz";

#[derive(Parser, Debug)]
#[command(name = "tidymypics")]
#[command(about = "Sort a folder of photos into labeled albums using an image classifier")]
#[command(after_help = "\
Organize mode (default): SOURCE_PATH is scanned recursively and every image is copied to
DEST_PATH/<label>/ (or DEST_PATH/<year>/<label>/ with --year). DEST_PATH must not exist yet.

Training mode (--train): SOURCE_PATH holds one subfolder of images per label. The new model is
evaluated against DEST_PATH, which must be an existing folder with the same layout.")]
pub struct Args {
    /// Train a new model instead of organizing photos
    #[arg(short, long, default_value_t = false)]
    pub train: bool,

    /// Group albums by the year each photo was taken
    #[arg(short, long, default_value_t = false)]
    pub year: bool,

    /// Model bundle written by training and read when organizing
    #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// Number of training epochs
    #[arg(long, default_value_t = 15)]
    pub epochs: usize,

    /// Training batch size
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Side length in pixels images are resized to before training
    #[arg(long, default_value_t = 128)]
    pub image_size: usize,

    /// Fraction of the dataset held out for validation
    #[arg(long, default_value_t = 0.2)]
    pub validation_split: f64,

    /// Seed for the train/validation split
    #[arg(long, default_value_t = 3224)]
    pub seed: u64,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// SOURCE_PATH DEST_PATH
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,
}

/// Validated configuration for a single run.
#[derive(Debug, Clone)]
pub struct Config {
    pub src_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub training_mode: bool,
    pub albums_by_year: bool,
    pub model_path: PathBuf,
    pub train_options: TrainOptions,
    pub verbose: bool,
}

#[derive(Debug)]
pub enum Invocation {
    Help(String),
    Run(Config),
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "src_dir={} dest_dir={} training_mode={} albums_by_year={} model={}",
            self.src_dir.display(),
            self.dest_dir.display(),
            self.training_mode,
            self.albums_by_year,
            self.model_path.display()
        )
    }
}

pub fn usage() -> String {
    Args::command().render_help().to_string()
}

/// Parse and validate the raw argument list (program name first).
///
/// Never exits the process; `main` decides the exit status from the result.
pub fn validate<I, T>(argv: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();

    if argv.len() <= 1 || wants_help(&argv[1..]) {
        return Ok(Invocation::Help(usage()));
    }

    let args = match Args::try_parse_from(&argv) {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::DisplayHelp => return Ok(Invocation::Help(usage())),
        Err(e) => {
            let msg = e.to_string();
            let msg = msg.trim_start_matches("error: ").trim_end();
            return Err(Error::Usage(msg.to_string()));
        }
    };

    if args.paths.len() != 2 {
        return Err(Error::Usage(
            "This app needs exactly 2 arguments: SOURCE_PATH and DEST_PATH.".to_string(),
        ));
    }

    let src_dir = absolute(&args.paths[0], "SOURCE_PATH")?;
    let dest_dir = absolute(&args.paths[1], "DEST_PATH")?;

    if !src_dir.is_dir() {
        return Err(Error::PathValidation(format!(
            "SOURCE_PATH ERROR: '{}' is not a valid existing directory.",
            src_dir.display()
        )));
    }

    if args.train && !dest_dir.is_dir() {
        return Err(Error::PathValidation(format!(
            "DEST_PATH ERROR: '{}' is not a valid existing directory.",
            dest_dir.display()
        )));
    }

    // `exists` also catches a plain file sitting at DEST_PATH.
    if !args.train && dest_dir.exists() {
        return Err(Error::PathValidation(format!(
            "DEST_PATH ERROR: '{}' already exists and cannot be used as output directory.",
            dest_dir.display()
        )));
    }

    let model_path = absolute(&args.model, "--model")?;

    Ok(Invocation::Run(Config {
        src_dir,
        dest_dir,
        training_mode: args.train,
        albums_by_year: args.year,
        model_path,
        train_options: TrainOptions {
            image_size: args.image_size,
            batch_size: args.batch_size,
            validation_split: args.validation_split,
            seed: args.seed,
            epochs: args.epochs,
        },
        verbose: args.verbose,
    }))
}

/// `-h`/`--help` anywhere before `--` wins over every other argument.
fn wants_help(args: &[OsString]) -> bool {
    args.iter()
        .take_while(|a| a.as_os_str() != "--")
        .any(|a| a == "-h" || a == "--help")
}

fn absolute(path: &Path, name: &str) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        Error::PathValidation(format!(
            "{} ERROR: '{}' is not a valid path: {}",
            name,
            path.display(),
            e
        ))
    })
}
