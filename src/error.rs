use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The edge source could not be opened or read.
    #[error("unable to read {}: {source}", .path.display())]
    Resource {
        source: io::Error,
        path: PathBuf,
    },

    #[error("execution environment failure: {0}")]
    Execution(String),

    #[error("run cancelled after {iterations} iteration(s)")]
    Cancelled { iterations: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn resource<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Error::Resource { source, path: path.into() }
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        Error::Execution(e.to_string())
    }
}
