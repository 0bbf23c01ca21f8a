use std::path::PathBuf;
use thiserror::Error;

/// Every way a run can fail. `main` prints these with an `ERROR:` prefix.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    PathValidation(String),

    #[error("could not load dataset: {0}")]
    DataLoad(String),

    #[error("invalid training configuration: {0}")]
    Config(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Recoverable: the organizer logs it and moves on to the next file.
    #[error("could not classify {}: {reason}", path.display())]
    Classification { path: PathBuf, reason: String },

    #[error("could not write {}: {source}", path.display())]
    IoFatal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io_fatal(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoFatal {
            path: path.into(),
            source,
        }
    }
}
