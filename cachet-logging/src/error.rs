use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("log file path cannot be empty")]
    EmptyLogPath,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid log format `{pattern}`: {reason}")]
    InvalidFormat { pattern: String, reason: String },

    #[error("another logger is already installed for the `log` facade")]
    LoggerAlreadySet,

    #[error("could not redirect {stream}: {source}")]
    Redirect {
        stream: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

impl LoggingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LoggingError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoggingError>;
