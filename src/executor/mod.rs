//! Testcase execution engine
//!
//! Provides the executor abstraction (pool and sequential variants), the
//! interrupt handle used for cancellation, and the testcase runner.

mod interrupt;
mod parallel;
mod runner;
mod single;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{TestCase, TestCaseResult};

pub use interrupt::Interrupt;
pub use parallel::PoolExecutor;
pub use runner::{run, run_with_interrupt, RunReport, TestCaseRunner};
pub use single::SingleExecutor;

/// Unit of work submitted to an executor: runs one testcase to a result
pub type Job = Arc<dyn Fn(&TestCase) -> TestCaseResult + Send + Sync>;

/// Lifecycle of an executor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutorState {
    NotStarted,
    Started,
    Submitted,
    Finished,
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorState::NotStarted => write!(f, "NOT_STARTED"),
            ExecutorState::Started => write!(f, "STARTED"),
            ExecutorState::Submitted => write!(f, "SUBMITTED"),
            ExecutorState::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Executor misuse
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("{operation} called in state {actual}, expected {expected}")]
    InvalidState {
        operation: &'static str,
        expected: ExecutorState,
        actual: ExecutorState,
    },
}

/// Checks the state transition precondition for `operation`
pub(crate) fn expect_state(
    operation: &'static str,
    expected: ExecutorState,
    actual: ExecutorState,
) -> Result<(), ExecutorError> {
    if actual == expected {
        Ok(())
    } else {
        Err(ExecutorError::InvalidState {
            operation,
            expected,
            actual,
        })
    }
}

/// Common contract of all execution strategies.
///
/// `wait_and_get_results` always returns one slot per submitted testcase, in
/// submission order. Slots that did not complete are `None`.
#[async_trait]
pub trait TestCaseExecutor: Send {
    /// Acquire workers and the progress display
    fn start(&mut self) -> Result<(), ExecutorError>;

    /// Hand the whole batch over in one shot
    fn submit(&mut self, job: Job, testcases: Vec<TestCase>) -> Result<(), ExecutorError>;

    /// Wait for completion or interruption
    async fn wait_and_get_results(&mut self) -> Result<Vec<Option<TestCaseResult>>, ExecutorError>;

    /// Release workers; idempotent and also run on drop
    fn shutdown(&mut self);

    fn state(&self) -> ExecutorState;
}

/// Parallel processing method
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// One worker per CPU, for CPU-bound handlers.
    ///
    /// Workers are blocking-pool threads of this process, not child
    /// processes: handler state is shared and a process abort ends the run.
    #[default]
    Process,
    /// Wider pool for handlers that mostly wait on I/O or child processes
    Thread,
    /// Sequential, one testcase at a time
    Single,
}

impl ExecutorKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "process" => Some(ExecutorKind::Process),
            "thread" => Some(ExecutorKind::Thread),
            "single" => Some(ExecutorKind::Single),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutorKind::Process => "process",
            ExecutorKind::Thread => "thread",
            ExecutorKind::Single => "single",
        }
    }

    /// Default worker count of this strategy
    pub fn default_workers(&self) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match self {
            ExecutorKind::Process => cpus,
            ExecutorKind::Thread => (cpus + 4).min(32),
            ExecutorKind::Single => 1,
        }
    }

    /// Build an executor of this kind
    pub fn create(&self, options: ExecutorOptions) -> Box<dyn TestCaseExecutor> {
        match self {
            ExecutorKind::Process | ExecutorKind::Thread => {
                let workers = options.max_workers.unwrap_or_else(|| self.default_workers());
                Box::new(PoolExecutor::new(*self, workers, options))
            }
            ExecutorKind::Single => Box::new(SingleExecutor::new(options)),
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options shared by all executor kinds
#[derive(Clone, Debug, Default)]
pub struct ExecutorOptions {
    /// Number of testcases, for the progress display
    pub total: usize,
    /// Override of the pool width
    pub max_workers: Option<usize>,
    pub show_progress: bool,
    pub interrupt: Interrupt,
}

impl ExecutorOptions {
    pub fn new(total: usize, interrupt: Interrupt) -> Self {
        Self {
            total,
            max_workers: None,
            show_progress: false,
            interrupt,
        }
    }

    pub fn with_max_workers(mut self, workers: Option<usize>) -> Self {
        self.max_workers = workers;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub(crate) fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(self.total as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}<{eta}]")
        {
            bar.set_style(style);
        }
        bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_kind_from_str() {
        assert_eq!(ExecutorKind::from_str("Process"), Some(ExecutorKind::Process));
        assert_eq!(ExecutorKind::from_str("THREAD"), Some(ExecutorKind::Thread));
        assert_eq!(ExecutorKind::from_str("single"), Some(ExecutorKind::Single));
        assert_eq!(ExecutorKind::from_str("fiber"), None);
    }

    #[test]
    fn test_default_workers() {
        assert!(ExecutorKind::Process.default_workers() >= 1);
        assert!(ExecutorKind::Thread.default_workers() >= 5);
        assert!(ExecutorKind::Thread.default_workers() <= 32);
        assert_eq!(ExecutorKind::Single.default_workers(), 1);
    }

    #[test]
    fn test_create_starts_not_started() {
        for kind in [ExecutorKind::Process, ExecutorKind::Thread, ExecutorKind::Single] {
            let executor = kind.create(ExecutorOptions::new(3, Interrupt::new()));
            assert_eq!(executor.state(), ExecutorState::NotStarted);
        }
    }

    #[test]
    fn test_expect_state() {
        assert!(expect_state("submit", ExecutorState::Started, ExecutorState::Started).is_ok());
        let err = expect_state("wait", ExecutorState::Submitted, ExecutorState::Started).unwrap_err();
        assert_eq!(
            err.to_string(),
            "wait called in state STARTED, expected SUBMITTED"
        );
    }
}
