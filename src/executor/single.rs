//! Sequential testcase execution

use async_trait::async_trait;
use indicatif::ProgressBar;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{expect_state, ExecutorError, ExecutorOptions, ExecutorState, Job, TestCaseExecutor};
use crate::models::{TestCase, TestCaseResult};

/// Runs testcases one at a time, in submission order
pub struct SingleExecutor {
    state: ExecutorState,
    options: ExecutorOptions,
    progress: Option<ProgressBar>,
    batch: Option<(Job, Vec<TestCase>)>,
}

impl SingleExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self {
            state: ExecutorState::NotStarted,
            options,
            progress: None,
            batch: None,
        }
    }
}

#[async_trait]
impl TestCaseExecutor for SingleExecutor {
    fn start(&mut self) -> Result<(), ExecutorError> {
        expect_state("start", ExecutorState::NotStarted, self.state)?;
        self.progress = Some(self.options.progress_bar());
        self.state = ExecutorState::Started;
        Ok(())
    }

    fn submit(&mut self, job: Job, testcases: Vec<TestCase>) -> Result<(), ExecutorError> {
        expect_state("submit", ExecutorState::Started, self.state)?;
        self.batch = Some((job, testcases));
        self.state = ExecutorState::Submitted;
        Ok(())
    }

    async fn wait_and_get_results(&mut self) -> Result<Vec<Option<TestCaseResult>>, ExecutorError> {
        expect_state("wait_and_get_results", ExecutorState::Submitted, self.state)?;
        let (job, testcases) = self.batch.take().unwrap_or_else(|| (noop_job(), Vec::new()));
        let interrupt = self.options.interrupt.clone();
        let progress = self.progress.clone().unwrap_or_else(ProgressBar::hidden);

        let start = Instant::now();
        let total = testcases.len();
        let mut results = Vec::with_capacity(total);

        for testcase in testcases {
            if interrupt.is_triggered() {
                break;
            }
            debug!("Running {}", testcase);

            let job = job.clone();
            let task = tokio::task::spawn_blocking(move || job(&testcase));
            tokio::select! {
                biased;
                _ = interrupt.triggered() => break,
                joined = task => {
                    match joined {
                        Ok(result) => results.push(Some(result)),
                        Err(e) => {
                            warn!("Worker failed: {}", e);
                            results.push(None);
                        }
                    }
                    progress.inc(1);
                }
            }
        }

        if results.len() < total {
            warn!("Execution cancelled; {} testcases left unrun", total - results.len());
            results.resize_with(total, || None);
        }

        info!(
            "single executor finished {}/{} testcases in {}ms",
            results.iter().filter(|r| r.is_some()).count(),
            total,
            start.elapsed().as_millis()
        );

        self.state = ExecutorState::Finished;
        Ok(results)
    }

    fn shutdown(&mut self) {
        self.batch = None;
        if let Some(progress) = self.progress.take() {
            progress.finish();
        }
    }

    fn state(&self) -> ExecutorState {
        self.state
    }
}

impl Drop for SingleExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn noop_job() -> Job {
    std::sync::Arc::new(|_: &TestCase| TestCaseResult::cancelled())
}
