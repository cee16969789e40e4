//! Testcase model
//!
//! A testcase is one input file plus its repeat identity within a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One unit of work handed to the handler
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique name within the run (`{stem}_{rep}{.ext}` when repeated)
    pub name: String,

    /// Input file the handler should consume
    pub input_path: PathBuf,

    /// Where the captured stdout is written
    pub stdout_path: PathBuf,

    /// Where the captured stderr is written
    pub stderr_path: PathBuf,

    /// Position in submission order (0-based)
    pub index: usize,

    /// Repeat number of this input (1-based)
    pub repeat: usize,
}

impl TestCase {
    /// Expand input files into testcases.
    ///
    /// Files are ordered by file name; every file yields `repeat_count`
    /// consecutive testcases. Indices follow that order.
    pub fn expand(
        files: &[PathBuf],
        repeat_count: usize,
        stdout_dir: &Path,
        stderr_dir: &Path,
    ) -> Vec<TestCase> {
        let mut sorted: Vec<&PathBuf> = files.iter().collect();
        sorted.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut testcases = Vec::with_capacity(sorted.len() * repeat_count);
        for input in sorted {
            for repeat in 1..=repeat_count {
                let name = if repeat_count > 1 {
                    repeated_name(input, repeat)
                } else {
                    file_name_of(input)
                };
                testcases.push(TestCase {
                    stdout_path: stdout_dir.join(&name),
                    stderr_path: stderr_dir.join(&name),
                    input_path: input.clone(),
                    index: testcases.len(),
                    repeat,
                    name,
                });
            }
        }
        testcases
    }

    /// File name of the input, without the repeat suffix
    pub fn input_file_name(&self) -> String {
        file_name_of(&self.input_path)
    }

    /// Read the whole input file
    pub fn read_input(&self) -> io::Result<String> {
        fs::read_to_string(&self.input_path)
    }

    /// Read the input file line by line, trimming surrounding whitespace
    pub fn read_lines(&self) -> io::Result<Vec<String>> {
        let reader = BufReader::new(fs::File::open(&self.input_path)?);
        reader
            .lines()
            .map(|line| line.map(|l| l.trim().to_string()))
            .collect()
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.name)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn repeated_name(path: &Path, repeat: usize) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.extension() {
        Some(ext) => format!("{stem}_{repeat}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{repeat}"),
    }
}
