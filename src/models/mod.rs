//! Data models for testcase execution
//!
//! Value types exchanged between the runner, the executors and the handler.

mod result;
mod testcase;

pub use result::{AttributeValue, Attributes, ResultStatus, TestCaseResult, TIME_ATTRIBUTE};
pub use testcase::TestCase;
