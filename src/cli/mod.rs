//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Batch testcase runner with result logs and log diffs
#[derive(Parser, Debug)]
#[command(name = "testcase-runner")]
#[command(version)]
#[command(about = "Run a program over a directory of testcases and compare result logs")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a shell command over every input file
    Run(RunArgs),

    /// Merge two or more result logs on their input hashes
    Diff(DiffArgs),

    /// List result logs under the log directory
    List(ListArgs),

    /// Print a stored result log
    Show(ShowArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding the input files
    pub input_dir: Option<PathBuf>,

    /// Shell command fed each input file on stdin
    #[arg(short, long)]
    pub command: Option<String>,

    /// Number of times every input is run
    #[arg(short, long)]
    pub repeat: Option<usize>,

    /// Executor: process, thread or single
    #[arg(short, long)]
    pub executor: Option<String>,

    /// Worker count for the process and thread executors
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Kill a testcase after this many seconds and record TLE
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Root directory for run folders
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Files copied into the run folder
    #[arg(long = "copy", value_name = "FILE")]
    pub copy_targets: Vec<PathBuf>,

    /// Do not record the `time` attribute
    #[arg(long)]
    pub no_time: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "summary")]
    pub format: String,
}

/// Arguments for diff command
#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Result logs: `result.json` files or run folders
    pub logs: Vec<PathBuf>,

    /// Diff the newest N logs under the log directory instead
    #[arg(short, long, conflicts_with = "logs")]
    pub latest: Option<usize>,

    /// Root directory searched by --latest
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Attributes where a larger value is better (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub higher_is_better: Vec<String>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Save the merged table into a new compare folder
    #[arg(short, long)]
    pub save: bool,

    /// Export the merged table to a CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Disable colored change marks
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Root directory to search
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Output format (table, json, json-pretty, csv)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Result log or run folder; defaults to the newest log
    pub log: Option<PathBuf>,

    /// Root directory searched when no log is given
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Export the log (format from the extension: .json or .csv)
    #[arg(short, long)]
    pub export: Option<PathBuf>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination path
        #[arg(default_value = "testcase-runner.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args() {
        let args = Args::parse_from([
            "testcase-runner",
            "run",
            "cases",
            "--command",
            "./solve",
            "-r",
            "3",
            "-e",
            "thread",
            "-j",
            "4",
            "--copy",
            "main.rs",
            "--copy",
            "Cargo.toml",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.input_dir, Some(PathBuf::from("cases")));
                assert_eq!(run.command.as_deref(), Some("./solve"));
                assert_eq!(run.repeat, Some(3));
                assert_eq!(run.executor.as_deref(), Some("thread"));
                assert_eq!(run.workers, Some(4));
                assert_eq!(run.copy_targets.len(), 2);
                assert_eq!(run.format, "summary");
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_diff_args() {
        let args = Args::parse_from([
            "testcase-runner",
            "-vv",
            "diff",
            "log/a",
            "log/b",
            "--higher-is-better",
            "score,accuracy",
        ]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Diff(diff) => {
                assert_eq!(diff.logs.len(), 2);
                assert_eq!(diff.higher_is_better, vec!["score", "accuracy"]);
                assert!(diff.latest.is_none());
            }
            _ => panic!("Expected Diff command"),
        }
    }

    #[test]
    fn test_diff_latest_conflicts_with_paths() {
        let result = Args::try_parse_from(["testcase-runner", "diff", "a", "--latest", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_init_default_path() {
        let args = Args::parse_from(["testcase-runner", "config", "init"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { path, force },
            }) => {
                assert_eq!(path, PathBuf::from("testcase-runner.yaml"));
                assert!(!force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
