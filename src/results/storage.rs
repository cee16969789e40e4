//! Result log storage and retrieval
//!
//! Persists logs as JSON inside run folders and discovers them again under a
//! log root.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::diff::MergedDiff;
use super::log::{format_cell, RunnerLog, LIBRARY_NAME};
use super::LogError;

/// File name of the log inside a run folder
pub const RESULT_FILE_NAME: &str = "result.json";

const COMPARE_SUFFIX: &str = "_COMPARE";
const DIFF_FILE_NAME: &str = "diff.json";

/// Brief information about a stored log
#[derive(Clone, Debug)]
pub struct LogInfo {
    pub path: PathBuf,
    pub folder: String,
    pub created_date: DateTime<Utc>,
    pub testcase_num: usize,
    pub average_score: Option<f64>,
}

/// Log storage rooted at a log directory
#[derive(Clone, Debug)]
pub struct LogStorage {
    root: PathBuf,
}

impl LogStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `log` as pretty JSON
    pub fn save(log: &RunnerLog, path: &Path) -> Result<(), LogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| LogError::io(parent, e))?;
        }

        let file = File::create(path).map_err(|e| LogError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, log).map_err(|e| LogError::io(path, e.into()))?;
        writer.flush().map_err(|e| LogError::io(path, e))?;

        info!("Saved result log to {}", path.display());
        Ok(())
    }

    /// Load a log from a `result.json` file or from a run folder
    pub fn load(path: &Path) -> Result<RunnerLog, LogError> {
        let file_path = if path.is_dir() {
            path.join(RESULT_FILE_NAME)
        } else {
            path.to_path_buf()
        };

        let file = File::open(&file_path).map_err(|e| LogError::io(&file_path, e))?;
        let log: RunnerLog =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| LogError::Parse {
                path: file_path.clone(),
                source: e,
            })?;

        if log.metadata().library_name != LIBRARY_NAME {
            return Err(LogError::ForeignLog {
                path: file_path,
                library: log.metadata().library_name.clone(),
            });
        }
        log.check_shape().map_err(|reason| LogError::Malformed {
            path: file_path.clone(),
            reason,
        })?;

        debug!("Loaded result log from {}", file_path.display());
        let folder = file_path.parent().unwrap_or_else(|| Path::new(""));
        Ok(log.with_base_dir(folder))
    }

    /// Recursively find every log under the root, newest first.
    ///
    /// JSON files that are not logs of this runner are skipped.
    pub fn discover(&self) -> Vec<(PathBuf, RunnerLog)> {
        let mut files = Vec::new();
        collect_json_files(&self.root, &mut files);

        let mut logs: Vec<(PathBuf, RunnerLog)> = files
            .into_iter()
            .filter_map(|path| match Self::load(&path) {
                Ok(log) => Some((path, log)),
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    None
                }
            })
            .collect();

        logs.sort_by(|a, b| b.1.metadata().created_date.cmp(&a.1.metadata().created_date));
        logs
    }

    pub fn list(&self) -> Vec<LogInfo> {
        self.discover()
            .into_iter()
            .map(|(path, log)| LogInfo {
                folder: log.base_dir().to_string(),
                created_date: log.metadata().created_date,
                testcase_num: log.metadata().testcase_num,
                average_score: log.summary().average_score,
                path,
            })
            .collect()
    }

    /// Most recently created log under the root
    pub fn latest(&self) -> Option<(PathBuf, RunnerLog)> {
        self.discover().into_iter().next()
    }

    /// Fresh `<root>/<timestamp>_COMPARE` folder path
    pub fn compare_dir(&self) -> PathBuf {
        let base = format!("{}{}", Local::now().format("%Y%m%d%H%M%S"), COMPARE_SUFFIX);
        let mut dir = self.root.join(&base);
        let mut i = 1;
        while dir.exists() {
            dir = self.root.join(format!("{base}-{i}"));
            i += 1;
        }
        dir
    }

    /// Save a merged diff into a new compare folder
    pub fn save_diff(&self, diff: &MergedDiff) -> Result<PathBuf> {
        let dir = self.compare_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let path = dir.join(DIFF_FILE_NAME);
        let file = File::create(&path).context("Failed to create diff file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), diff)
            .context("Failed to write diff")?;

        info!("Saved diff to {}", path.display());
        Ok(path)
    }

    /// Export a log to a file
    pub fn export(log: &RunnerLog, path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)?;
                serde_json::to_writer_pretty(BufWriter::new(file), log)?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;
                let columns: Vec<&str> = log.column_names().collect();
                writer.write_record(&columns)?;
                for row in 0..log.row_count() {
                    writer.write_record(columns.iter().map(|column| {
                        log.column(column)
                            .and_then(|cells| cells.get(row))
                            .map(format_cell)
                            .unwrap_or_default()
                    }))?;
                }
                writer.flush()?;
            }
        }

        info!("Exported results to {}", path.display());
        Ok(())
    }
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_json_files(&path, out);
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            out.push(path);
        }
    }
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}
