//! Configuration module
//!
//! Handles loading and managing run configuration.

mod env;
mod file;
mod settings;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::executor::ExecutorKind;

pub use env::{print_env_help, EnvConfig};
pub use file::{ConfigFile, DiffConfig};
pub use settings::{discover_inputs, RunnerSettings};

/// Run configuration, as written by users
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Directory holding the testcase input files
    pub input_dir: PathBuf,

    /// How many times every input is run
    pub repeat_count: usize,

    /// Record the elapsed seconds of every testcase
    pub measure_time: bool,

    /// Files copied into the log folder (e.g. the solution source)
    pub copy_target_files: Vec<PathBuf>,

    /// Parallel processing method: process, thread or single
    pub executor: String,

    /// Override of the worker count
    pub max_workers: Option<usize>,

    /// Write captured stdout to files
    pub stdout_file_output: bool,

    /// Write captured stderr to files
    pub stderr_file_output: bool,

    /// Root directory for run folders
    pub log_dir: PathBuf,

    /// Fixed run folder name instead of the timestamp
    pub log_folder_name: Option<String>,

    pub show_progress: bool,

    pub debug: bool,

    /// Shell command run by the bundled command handler
    pub command: Option<String>,

    /// Time limit for the bundled command handler
    pub timeout_secs: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("in"),
            repeat_count: 1,
            measure_time: true,
            copy_target_files: Vec::new(),
            executor: ExecutorKind::default().name().to_string(),
            max_workers: None,
            stdout_file_output: true,
            stderr_file_output: true,
            log_dir: PathBuf::from("log"),
            log_folder_name: None,
            show_progress: true,
            debug: false,
            command: None,
            timeout_secs: None,
        }
    }
}

impl RunnerConfig {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_repeat_count(mut self, repeat_count: usize) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    pub fn with_executor(mut self, kind: ExecutorKind) -> Self {
        self.executor = kind.name().to_string();
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn with_copy_target(mut self, path: impl Into<PathBuf>) -> Self {
        self.copy_target_files.push(path.into());
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn with_measure_time(mut self, measure: bool) -> Self {
        self.measure_time = measure;
        self
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
