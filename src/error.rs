//! Error types for the runner
//!
//! Configuration errors are raised before any testcase executes. Handler
//! failures never show up here: they are recorded as IE results.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::executor::ExecutorError;
use crate::results::LogError;

/// Errors that abort a run
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Invalid input path: {0} is not a directory")]
    InvalidPath(PathBuf),

    #[error("No testcase files found in {0}")]
    NoTestcaseFile(PathBuf),

    #[error("repeat_count must be 1 or greater, got {0}")]
    InvalidRepeatCount(usize),

    #[error("Unknown parallel processing method '{0}' (expected process, thread or single)")]
    UnknownExecutor(String),

    #[error("max_workers must be 1 or greater")]
    InvalidWorkerCount,

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Log(#[from] LogError),
}

impl RunnerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error comes from invalid configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RunnerError::InvalidPath(_)
                | RunnerError::NoTestcaseFile(_)
                | RunnerError::InvalidRepeatCount(_)
                | RunnerError::UnknownExecutor(_)
                | RunnerError::InvalidWorkerCount
                | RunnerError::UnsupportedVersion(_)
        )
    }
}

pub type Result<T, E = RunnerError> = std::result::Result<T, E>;
