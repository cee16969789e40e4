//! Testcase handlers
//!
//! A handler turns one testcase into one result. The runner calls it from
//! worker threads, so it must be shareable across them.

mod command;

use crate::models::{TestCase, TestCaseResult};

pub use command::{CommandHandler, EXIT_CODE_ATTRIBUTE};

/// User-supplied per-testcase logic.
///
/// Returning `Err` (or panicking) is not fatal: the runner records the
/// testcase as IE with the error message in stderr and moves on.
pub trait TestCaseHandler: Send + Sync + 'static {
    fn handle(&self, testcase: &TestCase) -> anyhow::Result<TestCaseResult>;
}

/// Adapter turning a closure into a [`TestCaseHandler`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> TestCaseHandler for FnHandler<F>
where
    F: Fn(&TestCase) -> anyhow::Result<TestCaseResult> + Send + Sync + 'static,
{
    fn handle(&self, testcase: &TestCase) -> anyhow::Result<TestCaseResult> {
        (self.f)(testcase)
    }
}

/// Wrap a closure as a handler
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&TestCase) -> anyhow::Result<TestCaseResult> + Send + Sync + 'static,
{
    FnHandler { f }
}
