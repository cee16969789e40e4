//! testcase-runner - batch testcase execution and result comparison
//!
//! Runs a program over every file of an input directory, records one result
//! log per run and diffs logs of different runs on their input hashes.
//!
//! ## Usage
//!
//! ```bash
//! # Run a solver over ./in with 8 workers
//! testcase-runner run in --command ./solver -j 8
//!
//! # Compare the two newest runs, larger scores are better
//! testcase-runner diff --latest 2 --higher-is-better score
//!
//! # Compare two specific run folders and keep the merged table
//! testcase-runner diff log/20260101120000 log/20260102120000 --save
//!
//! # List stored runs
//! testcase-runner list
//! ```

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, Command};
use testcase_runner::config::{print_env_help, ConfigFile, EnvConfig, RunnerConfig};
use testcase_runner::executor::{ExecutorKind, Interrupt};
use testcase_runner::handler::CommandHandler;
use testcase_runner::output::{write_to_file, OutputFormat, ResultFormatter};
use testcase_runner::results::{DiffEngine, Direction, ExportFormat, LogStorage, RunnerLog};
use testcase_runner::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env = EnvConfig::load();
    let config_path = args.config.clone().or_else(|| env.config_file.clone());
    let mut config = match &config_path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };
    env.apply_to(&mut config.runner);

    let mut level = LogLevel::from_verbosity(args.verbose, args.quiet);
    if config.runner.debug && level == LogLevel::Info {
        level = LogLevel::Debug;
    }
    init_logger(level);
    if let Some(path) = &config_path {
        debug!("Using configuration {}", path.display());
    }
    if env.has_any() {
        debug!("Applied TESTCASE_RUNNER_* environment overrides");
    }

    match args.command {
        Command::Run(run_args) => {
            run_testcases(run_args, config.runner).await?;
        }
        Command::Diff(diff_args) => {
            diff_logs(diff_args, &config)?;
        }
        Command::List(list_args) => {
            list_logs(list_args, &config.runner)?;
        }
        Command::Show(show_args) => {
            show_log(show_args, &config.runner)?;
        }
        Command::Config(config_args) => {
            manage_config(config_args, &config)?;
        }
    }

    Ok(())
}

fn parse_format(s: &str) -> Result<OutputFormat> {
    OutputFormat::from_str(s).ok_or_else(|| anyhow!("Unknown output format: {s}"))
}

/// Command line flags win over the file and the environment
fn apply_run_args(args: &cli::RunArgs, config: &mut RunnerConfig) -> Result<()> {
    if let Some(dir) = &args.input_dir {
        config.input_dir = dir.clone();
    }
    if let Some(command) = &args.command {
        config.command = Some(command.clone());
    }
    if let Some(repeat) = args.repeat {
        config.repeat_count = repeat;
    }
    if let Some(executor) = &args.executor {
        let kind = ExecutorKind::from_str(executor)
            .ok_or_else(|| anyhow!("Unknown executor: {executor} (process, thread, single)"))?;
        config.executor = kind.name().to_string();
    }
    if let Some(workers) = args.workers {
        config.max_workers = Some(workers);
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = Some(timeout);
    }
    if let Some(dir) = &args.log_dir {
        config.log_dir = dir.clone();
    }
    config
        .copy_target_files
        .extend(args.copy_targets.iter().cloned());
    if args.no_time {
        config.measure_time = false;
    }
    if args.no_progress {
        config.show_progress = false;
    }
    Ok(())
}

async fn run_testcases(args: cli::RunArgs, mut config: RunnerConfig) -> Result<()> {
    apply_run_args(&args, &mut config)?;
    let format = parse_format(&args.format)?;

    let command = config
        .command
        .clone()
        .ok_or_else(|| anyhow!("No command to run. Pass --command or set runner.command"))?;
    let handler = CommandHandler::new(&command)
        .with_timeout(config.timeout_secs.map(Duration::from_secs));

    info!(
        "Running `{}` over {} ({} repeat(s))",
        command,
        config.input_dir.display(),
        config.repeat_count
    );

    let interrupt = Interrupt::new();
    let ctrl_c = interrupt.listen_for_ctrl_c();
    let report = testcase_runner::run_with_interrupt(handler, &config, interrupt).await;
    ctrl_c.abort();
    let report = report?;

    let formatter = ResultFormatter::new(format);
    println!("{}", formatter.format_log(&report.log));
    info!("Result log: {}", report.result_path().display());

    Ok(())
}

fn storage_for(log_dir: Option<PathBuf>, config: &RunnerConfig) -> LogStorage {
    LogStorage::new(log_dir.unwrap_or_else(|| config.log_dir.clone()))
}

fn diff_logs(args: cli::DiffArgs, config: &ConfigFile) -> Result<()> {
    let storage = storage_for(args.log_dir.clone(), &config.runner);

    let logs: Vec<RunnerLog> = match args.latest {
        Some(count) => {
            let mut logs: Vec<RunnerLog> = storage
                .discover()
                .into_iter()
                .take(count)
                .map(|(_, log)| log)
                .collect();
            // oldest first, so source #1 is the baseline
            logs.reverse();
            logs
        }
        None => args
            .logs
            .iter()
            .map(|path| LogStorage::load(path))
            .collect::<Result<_, _>>()?,
    };

    let mut engine = DiffEngine::new();
    for attribute in config.diff.higher_is_better.iter().chain(&args.higher_is_better) {
        engine = engine.with_direction(attribute.clone(), Direction::HigherIsBetter);
    }

    let diff = engine.merge(&logs)?;
    if diff.row_count() == 0 {
        warn!("The logs share no input hash");
    }

    let mut formatter = ResultFormatter::new(parse_format(&args.format)?);
    if args.no_color {
        formatter = formatter.no_color();
    }
    println!("{}", formatter.format_diff(&diff));

    if args.save {
        let path = storage.save_diff(&diff)?;
        println!("Saved diff to {}", path.display());
    }
    if let Some(path) = &args.csv {
        diff.write_csv(path)?;
        println!("Exported diff to {}", path.display());
    }

    Ok(())
}

fn list_logs(args: cli::ListArgs, config: &RunnerConfig) -> Result<()> {
    let storage = storage_for(args.log_dir, config);
    let formatter = ResultFormatter::new(parse_format(&args.format)?);
    println!("{}", formatter.format_log_list(&storage.list()));
    Ok(())
}

fn show_log(args: cli::ShowArgs, config: &RunnerConfig) -> Result<()> {
    let log = match &args.log {
        Some(path) => LogStorage::load(path)?,
        None => {
            let storage = storage_for(args.log_dir.clone(), config);
            match storage.latest() {
                Some((_, log)) => log,
                None => bail!("No result logs under {}", storage.root().display()),
            }
        }
    };

    let formatter = ResultFormatter::new(parse_format(&args.format)?);
    println!("{}", formatter.format_log(&log));

    if let Some(path) = &args.export {
        let format = ExportFormat::from_extension(path)
            .ok_or_else(|| anyhow!("Cannot infer export format of {}", path.display()))?;
        LogStorage::export(&log, path, format)?;
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, config: &ConfigFile) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            if path.exists() && !force {
                bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    path.display()
                );
            }
            ConfigFile::example().save(&path)?;
            println!("✓ Configuration file created: {}", path.display());
        }

        cli::ConfigAction::Show { output } => {
            let content = serde_yaml::to_string(config)?;
            match output {
                Some(path) => {
                    write_to_file(&path, &content)?;
                    println!("✓ Configuration written to {}", path.display());
                }
                None => println!("{content}"),
            }
        }

        cli::ConfigAction::Env => {
            print_env_help();
        }
    }

    Ok(())
}
