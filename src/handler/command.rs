//! Shell command handler
//!
//! Runs a command with the testcase input on stdin and reports the exit
//! status as the result status.

use anyhow::{Context, Result};
use std::fs::File;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::runtime::{Builder, Handle};
use tracing::{debug, warn};

use super::TestCaseHandler;
use crate::models::{ResultStatus, TestCase, TestCaseResult};

/// Attribute holding the exit code of the command
pub const EXIT_CODE_ATTRIBUTE: &str = "exit_code";

/// Handler that runs `sh -c <command>` for every testcase.
///
/// Exit code 0 maps to AC, anything else to RE. The shell leads its own
/// process group; when a timeout is set and expires the whole group is
/// killed and the testcase is reported as TLE.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    command: String,
    timeout: Option<Duration>,
}

impl CommandHandler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn spawn(&self, testcase: &TestCase) -> Result<Child> {
        let stdin = File::open(&testcase.input_path).with_context(|| {
            format!("Failed to open input file: {}", testcase.input_path.display())
        })?;

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        command
            .spawn()
            .with_context(|| format!("Failed to spawn command: {}", self.command))
    }

    async fn run(&self, testcase: &TestCase) -> Result<TestCaseResult> {
        let mut child = self.spawn(testcase)?;
        let pid = child.id();
        let mut stdout = child.stdout.take().context("Failed to open stdout")?;
        let mut stderr = child.stderr.take().context("Failed to open stderr")?;
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let communicate = async {
            tokio::try_join!(
                tokio::io::copy(&mut stdout, &mut stdout_buf),
                tokio::io::copy(&mut stderr, &mut stderr_buf),
                child.wait(),
            )
            .context("Failed to communicate with command")
        };
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, communicate).await.ok(),
            None => Some(communicate.await),
        };

        let Some(outcome) = outcome else {
            warn!("{} timed out", testcase.name);
            kill_process_group(pid);
            if let Err(e) = child.kill().await {
                debug!("Failed to reap timed out command: {}", e);
            }
            return Ok(TestCaseResult::new(ResultStatus::TimeLimitExceeded));
        };
        let (_, _, status) = outcome?;

        let code = status.code().unwrap_or(-1);
        let result_status = if status.success() {
            ResultStatus::Accepted
        } else {
            ResultStatus::RuntimeError
        };

        Ok(TestCaseResult::new(result_status)
            .with_stdout(String::from_utf8_lossy(&stdout_buf))
            .with_stderr(String::from_utf8_lossy(&stderr_buf))
            .with_attribute(EXIT_CODE_ATTRIBUTE, code))
    }
}

impl TestCaseHandler for CommandHandler {
    fn handle(&self, testcase: &TestCase) -> Result<TestCaseResult> {
        debug!("Running '{}' on {}", self.command, testcase.name);
        match Handle::try_current() {
            Ok(handle) => handle.block_on(self.run(testcase)),
            Err(_) => Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build runtime for command")?
                .block_on(self.run(testcase)),
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!("Failed to kill process group {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
