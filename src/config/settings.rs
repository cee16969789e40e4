//! Resolved run settings
//!
//! Validates a [`RunnerConfig`] once, before any testcase runs, and owns the
//! layout of the run folder.

use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::RunnerConfig;
use crate::error::{Result, RunnerError};
use crate::executor::{ExecutorKind, ExecutorOptions, Interrupt};

const STDOUT_DIR: &str = "stdout";
const STDERR_DIR: &str = "stderr";
const INPUT_COPY_DIR: &str = "in";
const FIG_DIR: &str = "fig";
const RESULT_FILE: &str = "result.json";

/// Validated settings shared read-only by a run
#[derive(Clone, Debug)]
pub struct RunnerSettings {
    pub input_dir: PathBuf,
    pub repeat_count: usize,
    pub measure_time: bool,
    pub copy_target_files: Vec<PathBuf>,
    pub executor: ExecutorKind,
    pub max_workers: Option<usize>,
    pub stdout_file_output: bool,
    pub stderr_file_output: bool,
    pub show_progress: bool,
    pub debug: bool,
    pub log_dir: PathBuf,
    /// Folder owned by this run, `<log_dir>/<YYYYmmddHHMMSS>[-i]`
    pub log_folder: PathBuf,
}

impl RunnerSettings {
    /// Validate the configuration and pick a fresh log folder
    pub fn new(config: &RunnerConfig) -> Result<Self> {
        let executor = ExecutorKind::from_str(&config.executor)
            .ok_or_else(|| RunnerError::UnknownExecutor(config.executor.clone()))?;
        if config.repeat_count == 0 {
            return Err(RunnerError::InvalidRepeatCount(config.repeat_count));
        }
        if config.max_workers == Some(0) {
            return Err(RunnerError::InvalidWorkerCount);
        }
        discover_inputs(&config.input_dir)?;

        let log_folder = unique_folder(&config.log_dir, config.log_folder_name.as_deref());
        debug!("Log folder for this run: {}", log_folder.display());

        Ok(Self {
            input_dir: config.input_dir.clone(),
            repeat_count: config.repeat_count,
            measure_time: config.measure_time,
            copy_target_files: config.copy_target_files.clone(),
            executor,
            max_workers: config.max_workers,
            stdout_file_output: config.stdout_file_output,
            stderr_file_output: config.stderr_file_output,
            show_progress: config.show_progress,
            debug: config.debug,
            log_dir: config.log_dir.clone(),
            log_folder,
        })
    }

    pub fn stdout_dir(&self) -> PathBuf {
        self.log_folder.join(STDOUT_DIR)
    }

    pub fn stderr_dir(&self) -> PathBuf {
        self.log_folder.join(STDERR_DIR)
    }

    pub fn input_copy_dir(&self) -> PathBuf {
        self.log_folder.join(INPUT_COPY_DIR)
    }

    pub fn fig_dir(&self) -> PathBuf {
        self.log_folder.join(FIG_DIR)
    }

    pub fn result_path(&self) -> PathBuf {
        self.log_folder.join(RESULT_FILE)
    }

    /// Build executor options for a batch of `total` testcases
    pub fn executor_options(&self, total: usize, interrupt: Interrupt) -> ExecutorOptions {
        ExecutorOptions::new(total, interrupt)
            .with_max_workers(self.max_workers)
            .with_progress(self.show_progress)
    }

    /// Create the run folder layout and copy inputs and target files into it
    pub fn prepare(&self) -> Result<()> {
        for dir in [
            self.log_dir.clone(),
            self.log_folder.clone(),
            self.stdout_dir(),
            self.stderr_dir(),
            self.fig_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| RunnerError::io(&dir, e))?;
        }

        copy_dir(&self.input_dir, &self.input_copy_dir())?;
        self.copy_target_files();

        info!("Prepared log folder {}", self.log_folder.display());
        Ok(())
    }

    fn copy_target_files(&self) {
        for file in &self.copy_target_files {
            if file.is_dir() {
                warn!("{} is a directory; not copied", file.display());
                continue;
            }
            if !file.is_file() {
                warn!("{} not found; not copied", file.display());
                continue;
            }
            let Some(name) = file.file_name() else {
                continue;
            };
            if let Err(e) = fs::copy(file, self.log_folder.join(name)) {
                warn!("Failed to copy {}: {}", file.display(), e);
            }
        }
    }
}

/// List the testcase inputs of `dir`: regular, non-hidden files sorted by name.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RunnerError::InvalidPath(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|e| RunnerError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RunnerError::io(dir, e))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(RunnerError::NoTestcaseFile(dir.to_path_buf()));
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn unique_folder(log_dir: &Path, name: Option<&str>) -> PathBuf {
    let base = name
        .map(str::to_string)
        .unwrap_or_else(|| Local::now().format("%Y%m%d%H%M%S").to_string());

    let mut folder = log_dir.join(&base);
    let mut i = 1;
    while folder.exists() {
        folder = log_dir.join(format!("{base}-{i}"));
        i += 1;
    }
    folder
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| RunnerError::io(dst, e))?;
    for entry in fs::read_dir(src).map_err(|e| RunnerError::io(src, e))? {
        let entry = entry.map_err(|e| RunnerError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| RunnerError::io(&from, e))?;
        }
    }
    Ok(())
}
