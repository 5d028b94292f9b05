use crate::model::Side;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid ignore pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to list {side} files: {message}")]
    Listing { side: Side, message: String },

    #[error("{side} paths '{first}' and '{second}' differ only in case")]
    Ambiguity {
        side: Side,
        first: String,
        second: String,
    },

    #[error("'{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn listing(side: Side, message: impl Into<String>) -> Self {
        Error::Listing {
            side,
            message: message.into(),
        }
    }
}

/// Which stage a per-path failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathErrorKind {
    ContentCheck,
    Copy,
    Staging,
}

impl fmt::Display for PathErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathErrorKind::ContentCheck => write!(f, "content check"),
            PathErrorKind::Copy => write!(f, "copy"),
            PathErrorKind::Staging => write!(f, "staging"),
        }
    }
}

/// A failure tied to one path. Collected and reported at the end of a run,
/// never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub path: String,
    pub kind: PathErrorKind,
    pub message: String,
}

impl PathError {
    pub fn new(path: impl Into<String>, kind: PathErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error for '{}': {}", self.kind, self.path, self.message)
    }
}
