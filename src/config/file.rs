//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{is_yaml_file, RunnerConfig};
use crate::error::RunnerError;
use crate::executor::ExecutorKind;
use crate::results::Direction;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./testcase-runner.yaml",
    "./testcase-runner.yml",
    "./.testcase-runner.yaml",
    "~/.config/testcase-runner/config.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Run settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Diff settings
    #[serde(default)]
    pub diff: DiffConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            runner: RunnerConfig::default(),
            diff: DiffConfig::default(),
        }
    }
}

impl ConfigFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
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

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), RunnerError> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(RunnerError::UnsupportedVersion(self.version.clone()));
        }
        if ExecutorKind::from_str(&self.runner.executor).is_none() {
            return Err(RunnerError::UnknownExecutor(self.runner.executor.clone()));
        }
        if self.runner.repeat_count == 0 {
            return Err(RunnerError::InvalidRepeatCount(0));
        }
        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            runner: RunnerConfig {
                repeat_count: 1,
                executor: ExecutorKind::Thread.name().to_string(),
                copy_target_files: vec![PathBuf::from("main.rs")],
                command: Some("./solver".to_string()),
                timeout_secs: Some(10),
                ..Default::default()
            },
            diff: DiffConfig {
                higher_is_better: vec!["score".to_string()],
            },
        }
    }
}

/// Settings used when comparing logs
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Attributes where a larger value is an improvement
    #[serde(default)]
    pub higher_is_better: Vec<String>,
}

impl DiffConfig {
    /// Direction of `attribute`; lower is better unless listed
    pub fn direction(&self, attribute: &str) -> Direction {
        if self.higher_is_better.iter().any(|a| a == attribute) {
            Direction::HigherIsBetter
        } else {
            Direction::LowerIsBetter
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.version, "1.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = ConfigFile::example();
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.version, config.version);
        assert_eq!(loaded.runner.executor, "thread");
        assert_eq!(loaded.runner.timeout_secs, Some(10));
        assert_eq!(loaded.diff.higher_is_better, vec!["score"]);
    }

    #[test]
    fn test_validate_rejects_unknown_version() {
        let config = ConfigFile {
            version: "9.9".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RunnerError::UnsupportedVersion(v)) if v == "9.9"
        ));
    }

    #[test]
    fn test_load_rejects_bad_executor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "version: \"1.0\"\nrunner:\n  executor: gpu\n").unwrap();

        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn test_diff_direction() {
        let diff = ConfigFile::example().diff;
        assert_eq!(diff.direction("score"), Direction::HigherIsBetter);
        assert_eq!(diff.direction("time"), Direction::LowerIsBetter);
    }

    #[test]
    fn test_expand_path() {
        let path = expand_path("./test.yaml");
        assert_eq!(path, PathBuf::from("./test.yaml"));
    }
}
