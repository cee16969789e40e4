//! Batch testcase execution
//!
//! Runs a handler over a directory of input files with a selectable executor,
//! records every outcome in a hashed result log and merges logs of different
//! runs on their input hashes.
//!
//! ```no_run
//! use testcase_runner::{handler_fn, RunnerConfig, TestCaseResult};
//!
//! # async fn demo() -> testcase_runner::Result<()> {
//! let config = RunnerConfig::new("in");
//! let report = testcase_runner::run(
//!     handler_fn(|tc| {
//!         let n: i64 = tc.read_input()?.trim().parse()?;
//!         Ok(TestCaseResult::accepted().with_attribute("score", n))
//!     }),
//!     &config,
//! )
//! .await?;
//! println!("{:?}", report.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod handler;
pub mod models;
pub mod output;
pub mod results;
pub mod utils;

pub use config::{RunnerConfig, RunnerSettings};
pub use error::{Result, RunnerError};
pub use executor::{run, run_with_interrupt, ExecutorKind, Interrupt, RunReport, TestCaseRunner};
pub use handler::{handler_fn, CommandHandler, TestCaseHandler};
pub use models::{AttributeValue, ResultStatus, TestCase, TestCaseResult};
pub use results::{DiffEngine, Direction, LogStorage, MergedDiff, RunnerLog, RunnerLogBuilder};
