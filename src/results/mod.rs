//! Result logs
//!
//! Hashing, construction, persistence and cross-run comparison of run results.

mod builder;
mod diff;
mod hash;
mod log;
mod storage;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub use builder::RunnerLogBuilder;
pub use diff::{
    split_suffix, suffixed, Change, ColumnSummary, DiffEngine, DiffError, Direction, MergedDiff,
};
pub use hash::{bytes_hash, file_hash, hash_reader, try_file_hash, HASH_CHUNK_SIZE};
pub use log::{
    format_cell, is_reserved, Cell, ColumnKind, LogMetadata, LogSummary, OrderedMap, RunnerLog,
    INPUT_HASH_COLUMN, IN_COLUMN, LIBRARY_NAME, LIBRARY_VERSION, RESERVED_COLUMNS,
    SCORE_ATTRIBUTE, STATUS_COLUMN, STDERR_COLUMN, STDERR_HASH_COLUMN, STDOUT_COLUMN,
    STDOUT_HASH_COLUMN, TESTCASE_COLUMN,
};
pub use storage::{ExportFormat, LogInfo, LogStorage, RESULT_FILE_NAME};

/// Errors reading or writing persisted logs
#[derive(Error, Debug)]
pub enum LogError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse log {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} was written by '{library}', not by this runner")]
    ForeignLog { path: PathBuf, library: String },

    #[error("Malformed log {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl LogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LogError::Io {
            path: path.into(),
            source,
        }
    }
}
