//! Error taxonomy shared by the data store and the engine gateway.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Something the service needs is missing or misconfigured.
    #[error("{0}")]
    Configuration(String),

    /// A backing data file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    InvalidInput(String),

    /// Failure reported by the build engine, status and message verbatim.
    #[error("PoB error: {status}: {message}")]
    Engine { status: String, message: String },

    /// The engine ran but produced nothing usable.
    #[error("{0}")]
    EmptyResult(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures caused by the environment rather than the request.
    #[cfg(test)]
    pub(crate) fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
