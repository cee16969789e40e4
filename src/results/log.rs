//! Result log model
//!
//! A run is persisted as a column table plus metadata:
//!
//! ```json
//! {
//!   "contents": { "testcase": ["a.txt", ...], "score": [3, ...] },
//!   "metadata": {
//!     "library_name": "testcaserunner",
//!     "library_version": "0.3.0",
//!     "created_date": "2026-01-01T00:00:00Z",
//!     "testcase_num": 3,
//!     "attributes": { "testcase": "TEXT", "in": "URL", ... }
//!   }
//! }
//! ```
//!
//! Column order is significant and survives a write/read cycle.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::models::{AttributeValue, ResultStatus};

/// Name written to every log; logs with another name are rejected
pub const LIBRARY_NAME: &str = "testcaserunner";
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const TESTCASE_COLUMN: &str = "testcase";
pub const INPUT_HASH_COLUMN: &str = "input_hash";
pub const STDOUT_HASH_COLUMN: &str = "stdout_hash";
pub const STDERR_HASH_COLUMN: &str = "stderr_hash";
pub const IN_COLUMN: &str = "in";
pub const STDOUT_COLUMN: &str = "stdout";
pub const STDERR_COLUMN: &str = "stderr";
pub const STATUS_COLUMN: &str = "status";

/// Columns written for every row, in table order
pub const RESERVED_COLUMNS: [&str; 8] = [
    TESTCASE_COLUMN,
    INPUT_HASH_COLUMN,
    STDOUT_HASH_COLUMN,
    STDERR_HASH_COLUMN,
    IN_COLUMN,
    STDOUT_COLUMN,
    STDERR_COLUMN,
    STATUS_COLUMN,
];

/// Attribute averaged in run summaries
pub const SCORE_ATTRIBUTE: &str = "score";

pub fn is_reserved(column: &str) -> bool {
    RESERVED_COLUMNS.contains(&column)
}

/// One table cell; `None` when the row has no value for the column
pub type Cell = Option<AttributeValue>;

/// Render a cell for text output
pub fn format_cell(cell: &Cell) -> String {
    cell.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

/// How a reporting layer should present a column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnKind {
    /// Path to a file, relative to the run folder
    Url,
    /// Result status code
    Status,
    /// Plain value
    Text,
    /// Bookkeeping value not meant for display
    Metadata,
}

impl ColumnKind {
    /// Kind of a column by name
    pub fn of(column: &str) -> Self {
        match column {
            IN_COLUMN | STDOUT_COLUMN | STDERR_COLUMN => ColumnKind::Url,
            STATUS_COLUMN => ColumnKind::Status,
            INPUT_HASH_COLUMN | STDOUT_HASH_COLUMN | STDERR_HASH_COLUMN => ColumnKind::Metadata,
            _ => ColumnKind::Text,
        }
    }
}

/// String-keyed map that keeps insertion order, serialized as a JSON object
#[derive(Clone, Debug, PartialEq)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: DeserializeOwned> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = OrderedMap::new();
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<'de, V: DeserializeOwned> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// Metadata block of a persisted log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogMetadata {
    pub library_name: String,
    #[serde(default)]
    pub library_version: String,
    pub created_date: DateTime<Utc>,
    pub testcase_num: usize,
    /// Column name to column kind, in table order
    pub attributes: OrderedMap<ColumnKind>,
}

/// Per-status counts and score average of a log
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogSummary {
    pub total: usize,
    pub status_counts: Vec<(ResultStatus, usize)>,
    /// Mean `score` over all rows, where rows that are not AC count as 0
    pub average_score: Option<f64>,
}

/// A run's result table with its metadata
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunnerLog {
    contents: OrderedMap<Vec<Cell>>,
    metadata: LogMetadata,
    /// Name of the run folder the log was loaded from
    #[serde(skip)]
    base_dir: String,
}

impl RunnerLog {
    pub(crate) fn new(contents: OrderedMap<Vec<Cell>>, metadata: LogMetadata) -> Self {
        Self {
            contents,
            metadata,
            base_dir: String::new(),
        }
    }

    pub(crate) fn with_base_dir(mut self, folder: &Path) -> Self {
        self.base_dir = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self
    }

    pub fn metadata(&self) -> &LogMetadata {
        &self.metadata
    }

    pub fn contents(&self) -> &OrderedMap<Vec<Cell>> {
        &self.contents
    }

    /// Run folder name, empty for logs that were never saved or loaded
    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn row_count(&self) -> usize {
        self.contents.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.contents.keys()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.contents.contains_key(column)
    }

    pub fn column(&self, column: &str) -> Option<&[Cell]> {
        self.contents.get(column).map(Vec::as_slice)
    }

    /// Cell at `row`; `None` when the column or the value is absent
    pub fn get(&self, column: &str, row: usize) -> Option<&AttributeValue> {
        self.contents.get(column)?.get(row)?.as_ref()
    }

    pub fn column_kind(&self, column: &str) -> Option<ColumnKind> {
        self.metadata.attributes.get(column).copied()
    }

    /// Columns produced by the handler rather than the runner
    pub fn user_attributes(&self) -> Vec<&str> {
        self.contents.keys().filter(|c| !is_reserved(c)).collect()
    }

    pub fn status(&self, row: usize) -> Option<ResultStatus> {
        self.get(STATUS_COLUMN, row)?
            .as_str()
            .and_then(ResultStatus::from_str)
    }

    pub fn testcase_name(&self, row: usize) -> Option<&str> {
        self.get(TESTCASE_COLUMN, row)?.as_str()
    }

    /// Remove a column from both the table and the kind catalogue
    pub fn drop_column(&mut self, column: &str) {
        self.contents.remove(column);
        self.metadata.attributes.remove(column);
    }

    pub fn summary(&self) -> LogSummary {
        let total = self.row_count();
        let status_counts = ResultStatus::all()
            .into_iter()
            .map(|status| {
                let count = (0..total).filter(|&r| self.status(r) == Some(status)).count();
                (status, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect();

        let average_score = if self.has_column(SCORE_ATTRIBUTE) && total > 0 {
            let sum: f64 = (0..total)
                .filter(|&r| self.status(r) == Some(ResultStatus::Accepted))
                .filter_map(|r| self.get(SCORE_ATTRIBUTE, r).and_then(AttributeValue::as_f64))
                .sum();
            Some(sum / total as f64)
        } else {
            None
        };

        LogSummary {
            total,
            status_counts,
            average_score,
        }
    }

    /// Check that every column has one cell per testcase
    pub(crate) fn check_shape(&self) -> Result<(), String> {
        let expected = self.metadata.testcase_num;
        for (column, cells) in self.contents.iter() {
            if cells.len() != expected {
                return Err(format!(
                    "column '{}' has {} cells, expected {}",
                    column,
                    cells.len(),
                    expected
                ));
            }
        }
        Ok(())
    }
}

/// Path of `path` relative to `base`, with `/` separators
pub(crate) fn relative_path(path: &Path, base: &Path) -> String {
    let relative: PathBuf = path.strip_prefix(base).unwrap_or(path).to_path_buf();
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
