//! Testcase result models
//!
//! Defines result statuses, attribute values, and per-testcase results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute key under which the runner records the elapsed seconds
pub const TIME_ATTRIBUTE: &str = "time";

/// Final status of a single testcase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultStatus {
    /// Accepted
    #[default]
    #[serde(rename = "AC")]
    Accepted,
    /// Wrong answer
    #[serde(rename = "WA")]
    WrongAnswer,
    /// Runtime error in the program under test
    #[serde(rename = "RE")]
    RuntimeError,
    /// Time limit exceeded
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    /// Internal error: the handler itself failed
    #[serde(rename = "IE")]
    InternalError,
    /// Cancelled before completion
    #[serde(rename = "CAN")]
    Cancelled,
}

impl ResultStatus {
    /// Short code used in logs and tables
    pub fn code(&self) -> &'static str {
        match self {
            ResultStatus::Accepted => "AC",
            ResultStatus::WrongAnswer => "WA",
            ResultStatus::RuntimeError => "RE",
            ResultStatus::TimeLimitExceeded => "TLE",
            ResultStatus::InternalError => "IE",
            ResultStatus::Cancelled => "CAN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AC" => Some(ResultStatus::Accepted),
            "WA" => Some(ResultStatus::WrongAnswer),
            "RE" => Some(ResultStatus::RuntimeError),
            "TLE" => Some(ResultStatus::TimeLimitExceeded),
            "IE" => Some(ResultStatus::InternalError),
            "CAN" => Some(ResultStatus::Cancelled),
            _ => None,
        }
    }

    pub fn all() -> [ResultStatus; 6] {
        [
            ResultStatus::Accepted,
            ResultStatus::WrongAnswer,
            ResultStatus::RuntimeError,
            ResultStatus::TimeLimitExceeded,
            ResultStatus::InternalError,
            ResultStatus::Cancelled,
        ]
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultStatus::Accepted)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A handler-defined attribute value
///
/// Integers and floats are kept apart so that integer attributes survive a
/// write/read cycle of the result log unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Value equality where `Int(3)` and `Float(3.0)` are the same value
    pub fn same_as(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Text(a), AttributeValue::Text(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => {
                // three decimals, without trailing zeros
                let rounded = format!("{v:.3}");
                let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
                f.write_str(trimmed)
            }
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for AttributeValue {
            fn from(v: $t) -> Self {
                AttributeValue::Int(v as i64)
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        match i64::try_from(v) {
            Ok(v) => AttributeValue::Int(v),
            Err(_) => AttributeValue::Float(v as f64),
        }
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Float(v as f64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

/// Insertion-ordered attribute map
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, AttributeValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute; a replaced key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (k, v) in iter {
            attributes.insert(k, v);
        }
        attributes
    }
}

/// Result of running the handler on one testcase
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestCaseResult {
    pub status: ResultStatus,
    pub stdout: String,
    pub stderr: String,
    pub attributes: Attributes,
}

impl TestCaseResult {
    pub fn new(status: ResultStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn accepted() -> Self {
        Self::new(ResultStatus::Accepted)
    }

    /// Result recorded when the handler itself fails
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::InternalError,
            stderr: message.into(),
            ..Self::default()
        }
    }

    /// Result recorded for testcases that never completed
    pub fn cancelled() -> Self {
        Self::new(ResultStatus::Cancelled)
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key, value);
        self
    }
}

impl fmt::Display for TestCaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        for (key, value) in self.attributes.iter() {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}
