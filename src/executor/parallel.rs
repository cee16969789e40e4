//! Pooled testcase execution
//!
//! Runs every testcase on the blocking thread pool, bounded by a semaphore
//! whose width depends on the executor kind.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError};
use tracing::{debug, info, warn};

use super::{
    expect_state, ExecutorError, ExecutorKind, ExecutorOptions, ExecutorState, Interrupt, Job,
    TestCaseExecutor,
};
use crate::models::{TestCase, TestCaseResult};

type TaskOutput = (usize, Result<Option<TestCaseResult>, JoinError>);

/// Pool executor for the `process` and `thread` kinds
pub struct PoolExecutor {
    kind: ExecutorKind,
    workers: usize,
    state: ExecutorState,
    options: ExecutorOptions,
    semaphore: Option<Arc<Semaphore>>,
    progress: Option<ProgressBar>,
    pending: FuturesUnordered<futures::future::BoxFuture<'static, TaskOutput>>,
    aborts: Vec<AbortHandle>,
    total: usize,
}

impl PoolExecutor {
    pub fn new(kind: ExecutorKind, workers: usize, options: ExecutorOptions) -> Self {
        Self {
            kind,
            workers: workers.max(1),
            state: ExecutorState::NotStarted,
            options,
            semaphore: None,
            progress: None,
            pending: FuturesUnordered::new(),
            aborts: Vec::new(),
            total: 0,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn interrupt(&self) -> &Interrupt {
        &self.options.interrupt
    }
}

#[async_trait]
impl TestCaseExecutor for PoolExecutor {
    fn start(&mut self) -> Result<(), ExecutorError> {
        expect_state("start", ExecutorState::NotStarted, self.state)?;
        debug!("Starting {} pool with {} workers", self.kind, self.workers);
        self.semaphore = Some(Arc::new(Semaphore::new(self.workers)));
        self.progress = Some(self.options.progress_bar());
        self.state = ExecutorState::Started;
        Ok(())
    }

    fn submit(&mut self, job: Job, testcases: Vec<TestCase>) -> Result<(), ExecutorError> {
        expect_state("submit", ExecutorState::Started, self.state)?;
        let semaphore = self.semaphore.clone().unwrap_or_else(|| Arc::new(Semaphore::new(1)));
        let progress = self.progress.clone().unwrap_or_else(ProgressBar::hidden);

        self.total = testcases.len();
        for (slot, testcase) in testcases.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let progress = progress.clone();
            let interrupt = self.interrupt().clone();
            let job = job.clone();

            let handle = tokio::spawn(async move {
                // a closed semaphore means the pool has been released
                let _permit = semaphore.acquire_owned().await.ok()?;
                if interrupt.is_triggered() {
                    return None;
                }

                debug!("Dispatching {}", testcase);
                let result = tokio::task::spawn_blocking(move || job(&testcase)).await;
                progress.inc(1);
                match result {
                    Ok(result) => Some(result),
                    Err(e) => {
                        warn!("Worker for slot {} failed: {}", slot, e);
                        None
                    }
                }
            });

            self.aborts.push(handle.abort_handle());
            self.pending.push(async move { (slot, handle.await) }.boxed());
        }

        self.state = ExecutorState::Submitted;
        Ok(())
    }

    async fn wait_and_get_results(&mut self) -> Result<Vec<Option<TestCaseResult>>, ExecutorError> {
        expect_state("wait_and_get_results", ExecutorState::Submitted, self.state)?;

        let start = Instant::now();
        let interrupt = self.interrupt().clone();
        let mut slots: Vec<Option<TestCaseResult>> = (0..self.total).map(|_| None).collect();
        let mut interrupted = false;

        loop {
            tokio::select! {
                biased;
                _ = interrupt.triggered() => {
                    interrupted = true;
                    break;
                }
                next = self.pending.next() => match next {
                    Some((slot, output)) => store(&mut slots, slot, output),
                    None => break,
                },
            }
        }

        if interrupted {
            warn!("Execution cancelled; keeping results that already finished");
            // collect whatever completed in the meantime without waiting
            while let Some(Some((slot, output))) = self.pending.next().now_or_never() {
                store(&mut slots, slot, output);
            }
            for abort in &self.aborts {
                abort.abort();
            }
        }

        let finished = slots.iter().filter(|s| s.is_some()).count();
        info!(
            "{} pool finished {}/{} testcases in {}ms",
            self.kind,
            finished,
            self.total,
            start.elapsed().as_millis()
        );

        self.state = ExecutorState::Finished;
        Ok(slots)
    }

    fn shutdown(&mut self) {
        if let Some(semaphore) = self.semaphore.take() {
            semaphore.close();
        }
        for abort in self.aborts.drain(..) {
            abort.abort();
        }
        self.pending.clear();
        if let Some(progress) = self.progress.take() {
            progress.finish();
        }
    }

    fn state(&self) -> ExecutorState {
        self.state
    }
}

impl Drop for PoolExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn store(
    slots: &mut [Option<TestCaseResult>],
    slot: usize,
    output: Result<Option<TestCaseResult>, JoinError>,
) {
    match output {
        Ok(result) => slots[slot] = result,
        Err(e) if e.is_cancelled() => debug!("Slot {} was cancelled", slot),
        Err(e) => warn!("Task for slot {} failed: {}", slot, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttributeValue;
    use std::path::Path;
    use std::time::Duration;

    fn testcases(n: usize) -> Vec<TestCase> {
        let files: Vec<_> = (0..n)
            .map(|i| Path::new("in").join(format!("{i:02}.txt")))
            .collect();
        TestCase::expand(&files, 1, Path::new("out"), Path::new("err"))
    }

    fn executor(kind: ExecutorKind, workers: usize, interrupt: Interrupt) -> PoolExecutor {
        PoolExecutor::new(kind, workers, ExecutorOptions::new(0, interrupt))
    }

    #[tokio::test]
    async fn test_results_keep_submission_order() {
        let mut pool = executor(ExecutorKind::Thread, 4, Interrupt::new());
        let job: Job = Arc::new(|tc: &TestCase| {
            // later testcases finish first
            std::thread::sleep(Duration::from_millis(((8 - tc.index) * 5) as u64));
            TestCaseResult::accepted().with_attribute("index", tc.index)
        });

        pool.start().unwrap();
        pool.submit(job, testcases(8)).unwrap();
        let results = pool.wait_and_get_results().await.unwrap();

        assert_eq!(results.len(), 8);
        for (i, result) in results.iter().enumerate() {
            let result = result.as_ref().expect("completed");
            assert_eq!(result.attributes.get("index"), Some(&AttributeValue::from(i)));
        }
        assert_eq!(pool.state(), ExecutorState::Finished);
    }

    #[tokio::test]
    async fn test_process_kind_runs_jobs_in_this_process() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let mut pool = executor(ExecutorKind::Process, 2, Interrupt::new());
        let job: Job = {
            let calls = calls.clone();
            Arc::new(move |_: &TestCase| {
                calls.fetch_add(1, Ordering::SeqCst);
                TestCaseResult::accepted().with_attribute("pid", std::process::id() as i64)
            })
        };

        pool.start().unwrap();
        pool.submit(job, testcases(4)).unwrap();
        let results = pool.wait_and_get_results().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let pid = AttributeValue::from(std::process::id() as i64);
        assert!(results
            .iter()
            .all(|r| r.as_ref().and_then(|r| r.attributes.get("pid")) == Some(&pid)));
    }

    #[tokio::test]
    async fn test_submit_before_start_fails_fast() {
        let mut pool = executor(ExecutorKind::Process, 2, Interrupt::new());
        let job: Job = Arc::new(|_: &TestCase| TestCaseResult::accepted());

        let err = pool.submit(job, testcases(1)).unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::InvalidState {
                expected: ExecutorState::Started,
                actual: ExecutorState::NotStarted,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_wait_before_submit_fails_fast() {
        let mut pool = executor(ExecutorKind::Process, 2, Interrupt::new());
        pool.start().unwrap();
        assert!(pool.wait_and_get_results().await.is_err());
    }

    #[tokio::test]
    async fn test_interrupt_keeps_finished_results() {
        let interrupt = Interrupt::new();
        let mut pool = executor(ExecutorKind::Thread, 2, interrupt.clone());
        let job: Job = Arc::new(|tc: &TestCase| {
            if tc.index > 0 {
                std::thread::sleep(Duration::from_millis(500));
            }
            TestCaseResult::accepted()
        });

        pool.start().unwrap();
        pool.submit(job, testcases(5)).unwrap();

        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.trigger();
        });

        let results = pool.wait_and_get_results().await.unwrap();
        assert_eq!(results.len(), 5);
        assert!(results[0].is_some());
        assert!(results[1..].iter().all(|r| r.is_none()));
    }

    #[tokio::test]
    async fn test_pre_triggered_interrupt_runs_nothing() {
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let mut pool = executor(ExecutorKind::Process, 2, interrupt);
        let job: Job = Arc::new(|_: &TestCase| TestCaseResult::accepted());

        pool.start().unwrap();
        pool.submit(job, testcases(3)).unwrap();
        let results = pool.wait_and_get_results().await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_none()));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let mut pool = executor(ExecutorKind::Thread, 1, Interrupt::new());
        pool.start().unwrap();
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.workers(), 1);
    }
}
