//! Result log construction
//!
//! Turns the ordered (testcase, result) pairs of a run into a [`RunnerLog`].

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::hash::file_hash;
use super::log::{
    is_reserved, relative_path, Cell, ColumnKind, LogMetadata, OrderedMap, RunnerLog,
    INPUT_HASH_COLUMN, IN_COLUMN, LIBRARY_NAME, LIBRARY_VERSION, RESERVED_COLUMNS,
    STATUS_COLUMN, STDERR_COLUMN, STDERR_HASH_COLUMN, STDOUT_COLUMN, STDOUT_HASH_COLUMN,
    TESTCASE_COLUMN,
};
use crate::models::{TestCase, TestCaseResult};

/// Folder inside the run folder holding the copied inputs
const INPUT_COPY_DIR: &str = "in";

/// Builds the result table of one run
#[derive(Clone, Debug)]
pub struct RunnerLogBuilder {
    log_folder: PathBuf,
}

impl RunnerLogBuilder {
    /// `log_folder` is the run folder; file columns are written relative to it
    pub fn new(log_folder: impl Into<PathBuf>) -> Self {
        Self {
            log_folder: log_folder.into(),
        }
    }

    pub fn log_folder(&self) -> &Path {
        &self.log_folder
    }

    pub fn build(&self, results: &[(TestCase, TestCaseResult)]) -> RunnerLog {
        let attributes = self.collect_attributes(results);
        let mut contents: OrderedMap<Vec<Cell>> = OrderedMap::new();
        for column in RESERVED_COLUMNS
            .iter()
            .copied()
            .chain(attributes.iter().map(String::as_str))
        {
            contents.insert(column, Vec::with_capacity(results.len()));
        }

        for (testcase, result) in results {
            let row: Vec<(&str, Cell)> = vec![
                (TESTCASE_COLUMN, Some(testcase.name.clone().into())),
                (INPUT_HASH_COLUMN, Some(file_hash(&testcase.input_path).into())),
                (STDOUT_HASH_COLUMN, Some(file_hash(&testcase.stdout_path).into())),
                (STDERR_HASH_COLUMN, Some(file_hash(&testcase.stderr_path).into())),
                (
                    IN_COLUMN,
                    Some(format!("{}/{}", INPUT_COPY_DIR, testcase.input_file_name()).into()),
                ),
                (
                    STDOUT_COLUMN,
                    Some(relative_path(&testcase.stdout_path, &self.log_folder).into()),
                ),
                (
                    STDERR_COLUMN,
                    Some(relative_path(&testcase.stderr_path, &self.log_folder).into()),
                ),
                (STATUS_COLUMN, Some(result.status.code().into())),
            ];
            for (column, cell) in row {
                push(&mut contents, column, cell);
            }
            for attribute in &attributes {
                push(&mut contents, attribute, result.attributes.get(attribute).cloned());
            }
        }

        let kinds = contents
            .keys()
            .map(|column| (column.to_string(), ColumnKind::of(column)))
            .collect();
        debug!(
            "Built result log with {} rows and {} columns",
            results.len(),
            contents.len()
        );

        RunnerLog::new(
            contents,
            LogMetadata {
                library_name: LIBRARY_NAME.to_string(),
                library_version: LIBRARY_VERSION.to_string(),
                created_date: Utc::now(),
                testcase_num: results.len(),
                attributes: kinds,
            },
        )
        .with_base_dir(&self.log_folder)
    }

    /// Union of attribute keys in order of first appearance, minus reserved names
    fn collect_attributes(&self, results: &[(TestCase, TestCaseResult)]) -> Vec<String> {
        let mut attributes: Vec<String> = Vec::new();
        let mut rejected: Vec<&str> = Vec::new();
        for (_, result) in results {
            for key in result.attributes.keys() {
                if is_reserved(key) {
                    if !rejected.contains(&key) {
                        warn!("Attribute '{}' collides with a reserved column; dropped", key);
                        rejected.push(key);
                    }
                    continue;
                }
                if !attributes.iter().any(|a| a == key) {
                    attributes.push(key.to_string());
                }
            }
        }
        attributes
    }
}

fn push(contents: &mut OrderedMap<Vec<Cell>>, column: &str, cell: Cell) {
    if let Some(cells) = contents.get_mut(column) {
        cells.push(cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttributeValue, ResultStatus};
    use crate::results::hash::bytes_hash;
    use std::fs;
    use tempfile::tempdir;

    fn run_fixture(root: &Path) -> (PathBuf, Vec<(TestCase, TestCaseResult)>) {
        let input_dir = root.join("input");
        let folder = root.join("log").join("run");
        fs::create_dir_all(&input_dir).unwrap();
        fs::create_dir_all(folder.join("stdout")).unwrap();
        fs::create_dir_all(folder.join("stderr")).unwrap();

        let files: Vec<_> = ["a.txt", "b.txt"]
            .iter()
            .map(|name| {
                let path = input_dir.join(name);
                fs::write(&path, format!("{name}\n")).unwrap();
                path
            })
            .collect();
        let testcases = TestCase::expand(&files, 1, &folder.join("stdout"), &folder.join("stderr"));
        fs::write(&testcases[0].stdout_path, "3\n").unwrap();

        let results = vec![
            (
                testcases[0].clone(),
                TestCaseResult::accepted()
                    .with_attribute("score", 3)
                    .with_attribute("status", "shadowed"),
            ),
            (
                testcases[1].clone(),
                TestCaseResult::new(ResultStatus::WrongAnswer).with_attribute("time", 0.5),
            ),
        ];
        (folder, results)
    }

    #[test]
    fn test_columns_are_reserved_then_attributes() {
        let dir = tempdir().unwrap();
        let (folder, results) = run_fixture(dir.path());

        let log = RunnerLogBuilder::new(&folder).build(&results);
        let columns: Vec<_> = log.column_names().collect();
        assert_eq!(
            columns,
            vec![
                "testcase",
                "input_hash",
                "stdout_hash",
                "stderr_hash",
                "in",
                "stdout",
                "stderr",
                "status",
                "score",
                "time"
            ]
        );
        assert_eq!(log.metadata().testcase_num, 2);
        assert_eq!(log.column_kind("in"), Some(ColumnKind::Url));
        assert_eq!(log.base_dir(), "run");
    }

    #[test]
    fn test_cells() {
        let dir = tempdir().unwrap();
        let (folder, results) = run_fixture(dir.path());
        let log = RunnerLogBuilder::new(&folder).build(&results);

        assert_eq!(
            log.get("input_hash", 0).and_then(|v| v.as_str()),
            Some(bytes_hash(b"a.txt\n").as_str())
        );
        assert_eq!(
            log.get("stdout_hash", 0).and_then(|v| v.as_str()),
            Some(bytes_hash(b"3\n").as_str())
        );
        // never written
        assert_eq!(log.get("stderr_hash", 1).and_then(|v| v.as_str()), Some(""));
        assert_eq!(log.get("in", 1).and_then(|v| v.as_str()), Some("in/b.txt"));
        assert_eq!(log.get("stdout", 0).and_then(|v| v.as_str()), Some("stdout/a.txt"));
        assert_eq!(log.get("status", 0).and_then(|v| v.as_str()), Some("AC"));
        assert_eq!(log.get("score", 0), Some(&AttributeValue::Int(3)));
        assert_eq!(log.get("score", 1), None);
        assert_eq!(log.get("time", 1), Some(&AttributeValue::Float(0.5)));
    }

    #[test]
    fn test_empty_run() {
        let log = RunnerLogBuilder::new("log/empty").build(&[]);
        assert_eq!(log.row_count(), 0);
        assert_eq!(log.column_names().count(), RESERVED_COLUMNS.len());
    }
}
