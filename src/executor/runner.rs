//! Testcase runner
//!
//! Expands the input directory into testcases, drives an executor over them
//! and turns every outcome, including handler failures, into a result.

use std::any::Any;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Interrupt, Job};
use crate::config::{discover_inputs, RunnerConfig, RunnerSettings};
use crate::error::{Result, RunnerError};
use crate::handler::TestCaseHandler;
use crate::models::{TestCase, TestCaseResult, TIME_ATTRIBUTE};
use crate::results::{LogStorage, LogSummary, RunnerLog, RunnerLogBuilder};
use crate::utils::{Stopwatch, Timer};

/// Runs a handler over every testcase of a run
pub struct TestCaseRunner<H> {
    handler: Arc<H>,
    settings: Arc<RunnerSettings>,
    interrupt: Interrupt,
}

impl<H: TestCaseHandler> TestCaseRunner<H> {
    pub fn new(handler: H, settings: RunnerSettings) -> Self {
        Self {
            handler: Arc::new(handler),
            settings: Arc::new(settings),
            interrupt: Interrupt::new(),
        }
    }

    /// Use an externally owned interrupt handle
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Input files of the run, sorted by file name
    pub fn discover_inputs(&self) -> Result<Vec<PathBuf>> {
        discover_inputs(&self.settings.input_dir)
    }

    /// Expand the inputs into testcases in submission order
    pub fn make_testcases(&self) -> Result<Vec<TestCase>> {
        let files = self.discover_inputs()?;
        Ok(TestCase::expand(
            &files,
            self.settings.repeat_count,
            &self.settings.stdout_dir(),
            &self.settings.stderr_dir(),
        ))
    }

    /// Run every testcase; results follow submission order
    pub async fn run(&self) -> Result<Vec<(TestCase, TestCaseResult)>> {
        let testcases = self.make_testcases()?;
        self.ensure_capture_dirs()?;

        info!(
            "Running {} testcases with the {} executor",
            testcases.len(),
            self.settings.executor
        );

        let options = self
            .settings
            .executor_options(testcases.len(), self.interrupt.clone());
        let mut executor = self.settings.executor.create(options);
        executor.start()?;
        executor.submit(self.job(), testcases.clone())?;
        let slots = executor.wait_and_get_results().await;
        executor.shutdown();
        let slots = slots?;

        let results: Vec<(TestCase, TestCaseResult)> = testcases
            .into_iter()
            .zip(slots)
            .map(|(testcase, slot)| {
                let result = slot.unwrap_or_else(TestCaseResult::cancelled);
                (testcase, result)
            })
            .collect();

        log_outcome(&results);
        Ok(results)
    }

    fn job(&self) -> Job {
        let handler = self.handler.clone();
        let settings = self.settings.clone();
        let interrupt = self.interrupt.clone();
        Arc::new(move |testcase: &TestCase| {
            run_testcase(handler.as_ref(), &settings, &interrupt, testcase)
        })
    }

    fn ensure_capture_dirs(&self) -> Result<()> {
        let dirs = [
            (self.settings.stdout_file_output, self.settings.stdout_dir()),
            (self.settings.stderr_file_output, self.settings.stderr_dir()),
        ];
        for (enabled, dir) in dirs {
            if enabled {
                fs::create_dir_all(&dir).map_err(|e| RunnerError::io(&dir, e))?;
            }
        }
        Ok(())
    }
}

/// Run one testcase inside the failure boundary
fn run_testcase<H: TestCaseHandler>(
    handler: &H,
    settings: &RunnerSettings,
    interrupt: &Interrupt,
    testcase: &TestCase,
) -> TestCaseResult {
    let timer = Timer::start(testcase.name.clone());
    let outcome = catch_unwind(AssertUnwindSafe(|| handler.handle(testcase)));
    let elapsed = timer.stop();

    let mut result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!("{} failed: {:#}", testcase, e);
            TestCaseResult::internal_error(format!("{e:#}"))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("{} panicked: {}", testcase, message);
            TestCaseResult::internal_error(message)
        }
    };

    if settings.measure_time {
        result.attributes.insert(TIME_ATTRIBUTE, elapsed.as_secs_f64());
    }
    // the slot is recorded as CAN once interrupted, so its captures stay unwritten
    if interrupt.is_triggered() {
        debug!("{} finished after interrupt, discarding captures", testcase);
        return result;
    }
    if settings.stdout_file_output {
        write_capture(&testcase.stdout_path, &result.stdout);
    }
    if settings.stderr_file_output {
        write_capture(&testcase.stderr_path, &result.stderr);
    }

    debug!("{} -> {}", testcase, result);
    result
}

fn write_capture(path: &Path, content: &str) {
    if let Err(e) = fs::write(path, content) {
        warn!("Failed to write {}: {}", path.display(), e);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn log_outcome(results: &[(TestCase, TestCaseResult)]) {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for (_, result) in results {
        let code = result.status.code();
        match counts.iter_mut().find(|(c, _)| c == code) {
            Some((_, n)) => *n += 1,
            None => counts.push((code.to_string(), 1)),
        }
    }
    let counts: Vec<String> = counts.iter().map(|(c, n)| format!("{c}={n}")).collect();
    info!("Finished {} testcases: {}", results.len(), counts.join(" "));
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunReport {
    pub log_folder: PathBuf,
    pub results: Vec<(TestCase, TestCaseResult)>,
    pub log: RunnerLog,
}

impl RunReport {
    pub fn summary(&self) -> LogSummary {
        self.log.summary()
    }

    pub fn result_path(&self) -> PathBuf {
        self.log_folder.join(crate::results::RESULT_FILE_NAME)
    }
}

/// Run `handler` over the configured inputs end to end.
///
/// Validates the configuration, prepares the run folder, executes every
/// testcase, then builds and saves the log. No signal handler is installed;
/// use [`run_with_interrupt`] to make the run cancellable.
pub async fn run<H: TestCaseHandler>(handler: H, config: &RunnerConfig) -> Result<RunReport> {
    run_with_interrupt(handler, config, Interrupt::new()).await
}

/// Like [`run`], but triggering `interrupt` cancels the remaining testcases
/// and the log records them as CAN.
pub async fn run_with_interrupt<H: TestCaseHandler>(
    handler: H,
    config: &RunnerConfig,
    interrupt: Interrupt,
) -> Result<RunReport> {
    let mut stopwatch = Stopwatch::new();

    let settings = RunnerSettings::new(config)?;
    settings.prepare()?;
    stopwatch.lap("prepare");

    let log_folder = settings.log_folder.clone();
    let result_path = settings.result_path();

    let runner = TestCaseRunner::new(handler, settings).with_interrupt(interrupt);
    let results = runner.run().await?;
    stopwatch.lap("execute");

    let log = RunnerLogBuilder::new(&log_folder).build(&results);
    LogStorage::save(&log, &result_path)?;
    stopwatch.lap("log");

    debug!("Run timings:\n{}", stopwatch.format());
    Ok(RunReport {
        log_folder,
        results,
        log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorKind;
    use crate::handler::handler_fn;
    use crate::models::{AttributeValue, ResultStatus};
    use tempfile::tempdir;

    fn config(root: &Path, files: &[(&str, &str)]) -> RunnerConfig {
        let input = root.join("in");
        fs::create_dir_all(&input).unwrap();
        for (name, content) in files {
            fs::write(input.join(name), content).unwrap();
        }
        RunnerConfig::new(input)
            .with_log_dir(root.join("log"))
            .with_progress(false)
    }

    fn sum_handler(tc: &TestCase) -> anyhow::Result<TestCaseResult> {
        let line = tc.read_input()?;
        let sum: i64 = line
            .split_whitespace()
            .map(|n| n.parse::<i64>())
            .collect::<std::result::Result<Vec<_>, _>>()?
            .iter()
            .sum();
        Ok(TestCaseResult::accepted()
            .with_stdout(format!("{sum}\n"))
            .with_attribute("score", sum))
    }

    #[tokio::test]
    async fn test_results_follow_sorted_inputs() {
        let root = tempdir().unwrap();
        let config = config(root.path(), &[("b.txt", "3 4"), ("a.txt", "1 2")]);
        let settings = RunnerSettings::new(&config).unwrap();

        let runner = TestCaseRunner::new(handler_fn(sum_handler), settings);
        let results = runner.run().await.unwrap();

        let names: Vec<_> = results.iter().map(|(tc, _)| tc.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(results[1].1.attributes.get("score"), Some(&AttributeValue::Int(7)));
        assert!(results[0].1.attributes.contains_key(TIME_ATTRIBUTE));
        assert_eq!(
            fs::read_to_string(&results[0].0.stdout_path).unwrap(),
            "3\n"
        );
    }

    #[tokio::test]
    async fn test_repeats_expand_names() {
        let root = tempdir().unwrap();
        let config = config(root.path(), &[("a.txt", "1 1")])
            .with_repeat_count(3)
            .with_executor(ExecutorKind::Single);
        let runner = TestCaseRunner::new(
            handler_fn(sum_handler),
            RunnerSettings::new(&config).unwrap(),
        );

        let results = runner.run().await.unwrap();
        let names: Vec<_> = results.iter().map(|(tc, _)| tc.name.clone()).collect();
        assert_eq!(names, vec!["a_1.txt", "a_2.txt", "a_3.txt"]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_as_internal_errors() {
        let root = tempdir().unwrap();
        let config = config(
            root.path(),
            &[("a.txt", "1 2"), ("b.txt", "oops"), ("c.txt", "panic")],
        )
        .with_executor(ExecutorKind::Thread);
        let handler = handler_fn(|tc: &TestCase| {
            if tc.read_input()? == "panic" {
                panic!("boom in {}", tc.name);
            }
            sum_handler(tc)
        });

        let runner = TestCaseRunner::new(handler, RunnerSettings::new(&config).unwrap());
        let results = runner.run().await.unwrap();

        assert_eq!(results[0].1.status, ResultStatus::Accepted);
        assert_eq!(results[1].1.status, ResultStatus::InternalError);
        assert!(results[1].1.stderr.contains("invalid digit"));
        assert_eq!(results[2].1.status, ResultStatus::InternalError);
        assert_eq!(results[2].1.stderr, "boom in c.txt");
        assert_eq!(
            fs::read_to_string(&results[2].0.stderr_path).unwrap(),
            "boom in c.txt"
        );
    }

    #[tokio::test]
    async fn test_interrupted_run_records_cancelled() {
        let root = tempdir().unwrap();
        let config = config(root.path(), &[("a.txt", "1"), ("b.txt", "2")])
            .with_executor(ExecutorKind::Single)
            .with_measure_time(false);
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let runner = TestCaseRunner::new(handler_fn(sum_handler), RunnerSettings::new(&config).unwrap())
            .with_interrupt(interrupt);
        let results = runner.run().await.unwrap();

        assert!(results
            .iter()
            .all(|(_, r)| r.status == ResultStatus::Cancelled && r.attributes.is_empty()));
    }

    #[tokio::test]
    async fn test_testcase_finishing_after_interrupt_leaves_no_capture() {
        let root = tempdir().unwrap();
        let config = config(root.path(), &[("a.txt", "1 2"), ("b.txt", "3 4")])
            .with_executor(ExecutorKind::Single);
        let interrupt = Interrupt::new();
        let handler = {
            let interrupt = interrupt.clone();
            handler_fn(move |tc: &TestCase| {
                interrupt.trigger();
                sum_handler(tc)
            })
        };

        let runner = TestCaseRunner::new(handler, RunnerSettings::new(&config).unwrap())
            .with_interrupt(interrupt);
        let results = runner.run().await.unwrap();

        assert!(results.iter().all(|(_, r)| r.status == ResultStatus::Cancelled));
        for (tc, _) in &results {
            assert!(!tc.stdout_path.exists(), "{} was written", tc.stdout_path.display());
            assert!(!tc.stderr_path.exists());
        }
    }

    #[tokio::test]
    async fn test_run_with_interrupt_records_cancelled_log() {
        let root = tempdir().unwrap();
        let config = config(root.path(), &[("a.txt", "1 2"), ("b.txt", "2 2")])
            .with_executor(ExecutorKind::Thread);
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let report = run_with_interrupt(handler_fn(sum_handler), &config, interrupt)
            .await
            .unwrap();

        assert!(report.result_path().is_file());
        assert_eq!(report.log.status(0), Some(ResultStatus::Cancelled));
        assert_eq!(report.log.status(1), Some(ResultStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_run_writes_log_folder() {
        let root = tempdir().unwrap();
        let config = config(root.path(), &[("a.txt", "1 2"), ("b.txt", "2 2")]);

        let report = run(handler_fn(sum_handler), &config).await.unwrap();

        assert!(report.result_path().is_file());
        assert!(report.log_folder.join("in").join("a.txt").is_file());
        assert_eq!(report.log.row_count(), 2);
        assert_eq!(report.summary().average_score, Some(3.5));

        let loaded = LogStorage::load(&report.log_folder).unwrap();
        assert_eq!(loaded.contents(), report.log.contents());
    }

    #[tokio::test]
    async fn test_run_rejects_bad_config_before_running() {
        let root = tempdir().unwrap();
        let config = config(root.path(), &[("a.txt", "1")]).with_repeat_count(0);

        let err = run(handler_fn(sum_handler), &config).await.unwrap_err();
        assert!(err.is_config_error());
        assert!(!root.path().join("log").exists());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "handler panicked");
    }
}
