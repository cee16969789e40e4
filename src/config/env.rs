//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::RunnerConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "TESTCASE_RUNNER";

/// Configuration overrides read from `TESTCASE_RUNNER_*` variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// TESTCASE_RUNNER_INPUT_DIR
    pub input_dir: Option<PathBuf>,
    /// TESTCASE_RUNNER_REPEAT
    pub repeat_count: Option<usize>,
    /// TESTCASE_RUNNER_EXECUTOR
    pub executor: Option<String>,
    /// TESTCASE_RUNNER_MAX_WORKERS
    pub max_workers: Option<usize>,
    /// TESTCASE_RUNNER_LOG_DIR
    pub log_dir: Option<PathBuf>,
    /// TESTCASE_RUNNER_COMMAND
    pub command: Option<String>,
    /// TESTCASE_RUNNER_TIMEOUT
    pub timeout_secs: Option<u64>,
    /// TESTCASE_RUNNER_PROGRESS
    pub show_progress: Option<bool>,
    /// TESTCASE_RUNNER_DEBUG
    pub debug: Option<bool>,
    /// TESTCASE_RUNNER_CONFIG
    pub config_file: Option<PathBuf>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_vars(env::vars().filter(|(k, _)| k.starts_with(ENV_PREFIX)))
    }

    /// Build from `(name, value)` pairs using the full variable names
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |name: &str| vars.get(&format!("{ENV_PREFIX}_{name}")).cloned();

        Self {
            input_dir: get("INPUT_DIR").map(PathBuf::from),
            repeat_count: parse_num(get("REPEAT")),
            executor: get("EXECUTOR"),
            max_workers: parse_num(get("MAX_WORKERS")),
            log_dir: get("LOG_DIR").map(PathBuf::from),
            command: get("COMMAND"),
            timeout_secs: parse_num(get("TIMEOUT")),
            show_progress: get("PROGRESS").map(|v| parse_bool(&v)),
            debug: get("DEBUG").map(|v| parse_bool(&v)),
            config_file: get("CONFIG").map(PathBuf::from),
        }
    }

    /// Check if any override is set
    pub fn has_any(&self) -> bool {
        self.input_dir.is_some()
            || self.repeat_count.is_some()
            || self.executor.is_some()
            || self.max_workers.is_some()
            || self.log_dir.is_some()
            || self.command.is_some()
            || self.timeout_secs.is_some()
            || self.show_progress.is_some()
            || self.debug.is_some()
    }

    /// Override the fields of `config` that are set here
    pub fn apply_to(&self, config: &mut RunnerConfig) {
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(repeat) = self.repeat_count {
            config.repeat_count = repeat;
        }
        if let Some(executor) = &self.executor {
            config.executor = executor.clone();
        }
        if let Some(workers) = self.max_workers {
            config.max_workers = Some(workers);
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = dir.clone();
        }
        if let Some(command) = &self.command {
            config.command = Some(command.clone());
        }
        if let Some(timeout) = self.timeout_secs {
            config.timeout_secs = Some(timeout);
        }
        if let Some(show) = self.show_progress {
            config.show_progress = show;
        }
        if let Some(debug) = self.debug {
            config.debug = debug;
        }
    }
}

fn parse_num<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}

/// Print all TESTCASE_RUNNER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_INPUT_DIR    Directory with testcase input files");
    println!("  {ENV_PREFIX}_REPEAT       Number of runs per input");
    println!("  {ENV_PREFIX}_EXECUTOR     Parallel processing method (process, thread, single)");
    println!("  {ENV_PREFIX}_MAX_WORKERS  Worker count override");
    println!("  {ENV_PREFIX}_LOG_DIR      Root directory for run folders");
    println!("  {ENV_PREFIX}_COMMAND      Command run for every testcase");
    println!("  {ENV_PREFIX}_TIMEOUT      Command time limit in seconds");
    println!("  {ENV_PREFIX}_PROGRESS     Show the progress bar (true/false)");
    println!("  {ENV_PREFIX}_DEBUG        Enable debug logging (true/false)");
    println!("  {ENV_PREFIX}_CONFIG       Path to configuration file");
}
