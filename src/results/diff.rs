//! Cross-run comparison
//!
//! Joins two or more result logs on the input content hash and classifies,
//! per row and per compared column, how every source differs from the others.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use super::log::{
    format_cell, is_reserved, Cell, OrderedMap, RunnerLog, INPUT_HASH_COLUMN, STATUS_COLUMN,
    STDERR_COLUMN, STDERR_HASH_COLUMN, STDOUT_COLUMN, STDOUT_HASH_COLUMN,
};
use crate::models::AttributeValue;

/// Errors raised while merging logs
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DiffError {
    #[error("At least 2 logs are needed for a diff, got {0}")]
    NotEnoughLogs(usize),

    #[error("Log #{0} has no input_hash column")]
    MissingKeyColumn(usize),
}

/// Which way an attribute improves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    LowerIsBetter,
    HigherIsBetter,
}

/// Classification of one source's cell against the other sources
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Unchanged,
    Improved,
    Regressed,
    Changed,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Change::Unchanged => "unchanged",
            Change::Improved => "improved",
            Change::Regressed => "regressed",
            Change::Changed => "changed",
        };
        f.write_str(s)
    }
}

/// Column of a merged table: `input_hash` or `{column}.{source}`
pub fn suffixed(column: &str, source: usize) -> String {
    format!("{column}.{source}")
}

/// Split `{column}.{source}` back into its parts
pub fn split_suffix(merged: &str) -> Option<(&str, usize)> {
    let (column, source) = merged.rsplit_once('.')?;
    Some((column, source.parse().ok()?))
}

/// Per-column counts over a merged table
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    /// Rows where every source agrees
    pub unchanged: usize,
    /// Rows where at least one source differs
    pub differing: usize,
    /// Per source, rows where that source was the best value
    pub improved: Vec<usize>,
    /// Per source, rows where that source was the worst value
    pub regressed: Vec<usize>,
}

/// Hash-correlated merge of several logs
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergedDiff {
    /// Run folder name of each source, in source order
    sources: Vec<String>,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    /// Logical columns that were classified
    compared: Vec<String>,
    /// Per row: logical column to one classification per source
    changes: Vec<OrderedMap<Vec<Option<Change>>>>,
}

impl MergedDiff {
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn compared_columns(&self) -> &[String] {
        &self.compared
    }

    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Cell by merged column name
    pub fn get(&self, row: usize, column: &str) -> Option<&AttributeValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)?.as_ref()
    }

    /// Classification of `column` for `source` (1-based) on `row`
    pub fn change(&self, row: usize, column: &str, source: usize) -> Option<Change> {
        let per_source = self.changes.get(row)?.get(column)?;
        per_source.get(source.checked_sub(1)?).copied().flatten()
    }

    /// Classification of a merged cell such as `score.2` or `stdout_hash.1`
    pub fn cell_change(&self, row: usize, merged_column: &str) -> Option<Change> {
        let (column, source) = split_suffix(merged_column)?;
        let logical = match column {
            STDOUT_HASH_COLUMN => STDOUT_COLUMN,
            STDERR_HASH_COLUMN => STDERR_COLUMN,
            other => other,
        };
        self.change(row, logical, source)
    }

    /// True when no compared cell of `row` differs
    pub fn is_row_unchanged(&self, row: usize) -> bool {
        self.changes.get(row).is_some_and(|changes| {
            changes
                .values()
                .flatten()
                .all(|c| matches!(c, None | Some(Change::Unchanged)))
        })
    }

    pub fn summary(&self) -> Vec<ColumnSummary> {
        self.compared
            .iter()
            .map(|column| {
                let mut summary = ColumnSummary {
                    column: column.clone(),
                    unchanged: 0,
                    differing: 0,
                    improved: vec![0; self.sources.len()],
                    regressed: vec![0; self.sources.len()],
                };
                for changes in &self.changes {
                    let Some(per_source) = changes.get(column) else {
                        continue;
                    };
                    if per_source.iter().flatten().all(|c| *c == Change::Unchanged) {
                        summary.unchanged += 1;
                        continue;
                    }
                    summary.differing += 1;
                    for (i, change) in per_source.iter().enumerate() {
                        match change {
                            Some(Change::Improved) => summary.improved[i] += 1,
                            Some(Change::Regressed) => summary.regressed[i] += 1,
                            _ => {}
                        }
                    }
                }
                summary
            })
            .collect()
    }

    /// Write the merged table as CSV
    pub fn write_csv(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(format_cell))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Merges result logs and classifies their differences
#[derive(Clone, Debug, Default)]
pub struct DiffEngine {
    directions: HashMap<String, Direction>,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direction(mut self, attribute: impl Into<String>, direction: Direction) -> Self {
        self.directions.insert(attribute.into(), direction);
        self
    }

    pub fn direction(&self, attribute: &str) -> Direction {
        self.directions.get(attribute).copied().unwrap_or_default()
    }

    pub fn merge(&self, logs: &[RunnerLog]) -> Result<MergedDiff, DiffError> {
        if logs.len() < 2 {
            return Err(DiffError::NotEnoughLogs(logs.len()));
        }
        for (i, log) in logs.iter().enumerate() {
            if !log.has_column(INPUT_HASH_COLUMN) {
                return Err(DiffError::MissingKeyColumn(i + 1));
            }
        }

        let mut columns = vec![INPUT_HASH_COLUMN.to_string()];
        for (i, log) in logs.iter().enumerate() {
            columns.extend(
                log.column_names()
                    .filter(|c| *c != INPUT_HASH_COLUMN)
                    .map(|c| suffixed(c, i + 1)),
            );
        }

        let lookups: Vec<HashMap<(String, usize), usize>> =
            logs.iter().map(occurrence_index).collect();
        let compared = compared_columns(logs);

        let mut rows = Vec::new();
        let mut changes = Vec::new();
        for (key, ordinal) in occurrences(&logs[0]) {
            let matched: Option<Vec<usize>> = lookups
                .iter()
                .map(|lookup| lookup.get(&(key.clone(), ordinal)).copied())
                .collect();
            let Some(source_rows) = matched else {
                continue;
            };

            let mut row: Vec<Cell> = vec![Some(AttributeValue::Text(key))];
            for (log, &r) in logs.iter().zip(&source_rows) {
                for column in log.column_names().filter(|c| *c != INPUT_HASH_COLUMN) {
                    row.push(log.get(column, r).cloned());
                }
            }
            rows.push(row);
            changes.push(self.classify_row(logs, &source_rows, &compared));
        }

        info!(
            "Merged {} logs into {} rows ({} rows in the first log)",
            logs.len(),
            rows.len(),
            logs[0].row_count()
        );

        Ok(MergedDiff {
            sources: logs.iter().map(|l| l.base_dir().to_string()).collect(),
            columns,
            rows,
            compared,
            changes,
        })
    }

    fn classify_row(
        &self,
        logs: &[RunnerLog],
        source_rows: &[usize],
        compared: &[String],
    ) -> OrderedMap<Vec<Option<Change>>> {
        let mut changes = OrderedMap::new();
        for column in compared {
            // stdout/stderr are compared through their content hashes
            let value_column = match column.as_str() {
                STDOUT_COLUMN => STDOUT_HASH_COLUMN,
                STDERR_COLUMN => STDERR_HASH_COLUMN,
                other => other,
            };
            let present: Vec<Option<Option<&AttributeValue>>> = logs
                .iter()
                .zip(source_rows)
                .map(|(log, &r)| {
                    log.column(value_column)
                        .map(|cells| cells.get(r).and_then(Option::as_ref))
                })
                .collect();

            let ranked = !is_reserved(value_column);
            let direction = self.direction(column);
            changes.insert(column.clone(), classify(&present, ranked, direction));
        }
        changes
    }
}

/// Classify one logical column across sources.
///
/// The outer `None` marks a source without the column, the inner one a null cell.
fn classify(
    values: &[Option<Option<&AttributeValue>>],
    ranked: bool,
    direction: Direction,
) -> Vec<Option<Change>> {
    let cells: Vec<Option<&AttributeValue>> = values.iter().flatten().copied().collect();
    let all_equal = cells.windows(2).all(|w| cells_equal(w[0], w[1]));
    let uniform = |change: Change| -> Vec<Option<Change>> {
        values.iter().map(|v| v.map(|_| change)).collect()
    };

    if all_equal {
        return uniform(Change::Unchanged);
    }

    let numbers: Option<Vec<f64>> = cells
        .iter()
        .map(|c| c.and_then(AttributeValue::as_f64))
        .collect();
    let Some(numbers) = numbers.filter(|_| ranked) else {
        return uniform(Change::Changed);
    };

    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (best, worst) = match direction {
        Direction::LowerIsBetter => (min, max),
        Direction::HigherIsBetter => (max, min),
    };

    values
        .iter()
        .map(|v| {
            let value = (*v)?.and_then(AttributeValue::as_f64)?;
            Some(if value == best {
                Change::Improved
            } else if value == worst {
                Change::Regressed
            } else {
                Change::Changed
            })
        })
        .collect()
}

fn cells_equal(a: Option<&AttributeValue>, b: Option<&AttributeValue>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_as(b),
        _ => false,
    }
}

/// Logical columns classified in a merge: status, stdout, stderr, then every
/// user attribute present in at least two logs
fn compared_columns(logs: &[RunnerLog]) -> Vec<String> {
    let mut compared: Vec<String> = Vec::new();
    for (column, backing) in [
        (STATUS_COLUMN, STATUS_COLUMN),
        (STDOUT_COLUMN, STDOUT_HASH_COLUMN),
        (STDERR_COLUMN, STDERR_HASH_COLUMN),
    ] {
        if logs.iter().filter(|l| l.has_column(backing)).count() >= 2 {
            compared.push(column.to_string());
        }
    }

    for log in logs {
        for attribute in log.user_attributes() {
            let present = logs.iter().filter(|l| l.has_column(attribute)).count();
            if present >= 2 && !compared.iter().any(|c| c == attribute) {
                compared.push(attribute.to_string());
            }
        }
    }
    debug!("Comparing columns: {:?}", compared);
    compared
}

/// (hash, occurrence ordinal) for every row, in row order
fn occurrences(log: &RunnerLog) -> Vec<(String, usize)> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    (0..log.row_count())
        .map(|r| {
            let key = log.get(INPUT_HASH_COLUMN, r).map(|v| v.to_string()).unwrap_or_default();
            let ordinal = seen.entry(key.clone()).or_insert(0);
            *ordinal += 1;
            (key, *ordinal)
        })
        .collect()
}

fn occurrence_index(log: &RunnerLog) -> HashMap<(String, usize), usize> {
    occurrences(log)
        .into_iter()
        .enumerate()
        .map(|(row, key)| (key, row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::log::{ColumnKind, LogMetadata, LIBRARY_NAME, TESTCASE_COLUMN};
    use chrono::Utc;

    fn log(rows: &[(&str, &str, &str, Option<i64>)]) -> RunnerLog {
        let mut contents: OrderedMap<Vec<Cell>> = OrderedMap::new();
        contents.insert(TESTCASE_COLUMN, rows.iter().map(|r| Some(r.0.into())).collect());
        contents.insert(INPUT_HASH_COLUMN, rows.iter().map(|r| Some(r.1.into())).collect());
        contents.insert(STDOUT_HASH_COLUMN, rows.iter().map(|_| Some("o".into())).collect());
        contents.insert(STATUS_COLUMN, rows.iter().map(|r| Some(r.2.into())).collect());
        contents.insert("score", rows.iter().map(|r| r.3.map(Into::into)).collect());

        let attributes = contents
            .keys()
            .map(|k| (k.to_string(), ColumnKind::of(k)))
            .collect();
        RunnerLog::new(
            contents,
            LogMetadata {
                library_name: LIBRARY_NAME.to_string(),
                library_version: String::new(),
                created_date: Utc::now(),
                testcase_num: rows.len(),
                attributes,
            },
        )
    }

    #[test]
    fn test_needs_two_logs() {
        let engine = DiffEngine::new();
        assert_eq!(engine.merge(&[]), Err(DiffError::NotEnoughLogs(0)));
        assert_eq!(
            engine.merge(&[log(&[("a", "h1", "AC", Some(1))])]),
            Err(DiffError::NotEnoughLogs(1))
        );
    }

    #[test]
    fn test_missing_key_column() {
        let mut second = log(&[("a", "h1", "AC", Some(1))]);
        second.drop_column(INPUT_HASH_COLUMN);
        let result = DiffEngine::new().merge(&[log(&[("a", "h1", "AC", Some(1))]), second]);
        assert_eq!(result, Err(DiffError::MissingKeyColumn(2)));
    }

    #[test]
    fn test_columns_are_suffixed() {
        let a = log(&[("a", "h1", "AC", Some(1))]);
        let diff = DiffEngine::new().merge(&[a.clone(), a]).unwrap();
        assert_eq!(
            diff.columns(),
            &[
                "input_hash",
                "testcase.1",
                "stdout_hash.1",
                "status.1",
                "score.1",
                "testcase.2",
                "stdout_hash.2",
                "status.2",
                "score.2"
            ]
        );
        assert_eq!(diff.get(0, "score.2"), Some(&AttributeValue::Int(1)));
    }

    #[test]
    fn test_inner_join_drops_unmatched_rows() {
        let first = log(&[("a", "h1", "AC", Some(1)), ("b", "h2", "AC", Some(2))]);
        let second = log(&[("b", "h2", "AC", Some(2)), ("c", "h3", "AC", Some(3))]);
        let diff = DiffEngine::new().merge(&[first, second]).unwrap();

        assert_eq!(diff.row_count(), 1);
        assert_eq!(diff.get(0, "input_hash").and_then(|v| v.as_str()), Some("h2"));
        assert!(diff.is_row_unchanged(0));
    }

    #[test]
    fn test_duplicate_hashes_pair_by_occurrence() {
        let first = log(&[("x_1", "h", "AC", Some(1)), ("x_2", "h", "AC", Some(2))]);
        let second = log(&[("x_1", "h", "AC", Some(1)), ("x_2", "h", "AC", Some(5))]);
        let diff = DiffEngine::new().merge(&[first, second]).unwrap();

        assert_eq!(diff.row_count(), 2);
        assert_eq!(diff.change(0, "score", 1), Some(Change::Unchanged));
        assert_eq!(diff.change(1, "score", 1), Some(Change::Improved));
        assert_eq!(diff.change(1, "score", 2), Some(Change::Regressed));
    }

    #[test]
    fn test_higher_is_better_reverses_ranking() {
        let first = log(&[("a", "h1", "AC", Some(3))]);
        let second = log(&[("a", "h1", "AC", Some(6))]);
        let diff = DiffEngine::new()
            .with_direction("score", Direction::HigherIsBetter)
            .merge(&[first, second])
            .unwrap();

        assert_eq!(diff.cell_change(0, "score.1"), Some(Change::Regressed));
        assert_eq!(diff.cell_change(0, "score.2"), Some(Change::Improved));
    }

    #[test]
    fn test_middle_value_is_changed() {
        let logs = [
            log(&[("a", "h1", "AC", Some(1))]),
            log(&[("a", "h1", "AC", Some(2))]),
            log(&[("a", "h1", "AC", Some(3))]),
        ];
        let diff = DiffEngine::new().merge(&logs).unwrap();

        assert_eq!(diff.change(0, "score", 1), Some(Change::Improved));
        assert_eq!(diff.change(0, "score", 2), Some(Change::Changed));
        assert_eq!(diff.change(0, "score", 3), Some(Change::Regressed));
    }

    #[test]
    fn test_status_and_nulls_are_unranked() {
        let first = log(&[("a", "h1", "AC", Some(1))]);
        let second = log(&[("a", "h1", "WA", None)]);
        let diff = DiffEngine::new().merge(&[first, second]).unwrap();

        assert_eq!(diff.change(0, "status", 1), Some(Change::Changed));
        assert_eq!(diff.change(0, "status", 2), Some(Change::Changed));
        assert_eq!(diff.change(0, "score", 2), Some(Change::Changed));
        assert_eq!(diff.change(0, "stdout", 1), Some(Change::Unchanged));
        assert_eq!(diff.cell_change(0, "stdout_hash.2"), Some(Change::Unchanged));
        assert!(!diff.is_row_unchanged(0));
    }

    #[test]
    fn test_summary() {
        let first = log(&[("a", "h1", "AC", Some(1)), ("b", "h2", "AC", Some(4))]);
        let second = log(&[("a", "h1", "AC", Some(1)), ("b", "h2", "AC", Some(2))]);
        let diff = DiffEngine::new().merge(&[first, second]).unwrap();

        let score = diff
            .summary()
            .into_iter()
            .find(|s| s.column == "score")
            .unwrap();
        assert_eq!(score.unchanged, 1);
        assert_eq!(score.differing, 1);
        assert_eq!(score.improved, vec![0, 1]);
        assert_eq!(score.regressed, vec![1, 0]);
    }

    #[test]
    fn test_split_suffix() {
        assert_eq!(split_suffix("score.2"), Some(("score", 2)));
        assert_eq!(split_suffix("a.b.10"), Some(("a.b", 10)));
        assert_eq!(split_suffix("score"), None);
    }
}
