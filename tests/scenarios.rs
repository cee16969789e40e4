//! End-to-end runs over a temporary input directory, followed by diffs of
//! the resulting logs.

use std::fs;
use std::path::Path;

use tempfile::tempdir;
use testcase_runner::results::{Change, LogStorage};
use testcase_runner::{
    handler_fn, run, DiffEngine, Direction, ExecutorKind, ResultStatus, RunnerConfig, TestCase,
    TestCaseResult,
};

fn write_inputs(dir: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
}

fn config(input: &Path, log_dir: &Path) -> RunnerConfig {
    RunnerConfig::new(input)
        .with_log_dir(log_dir)
        .with_executor(ExecutorKind::Thread)
        .with_progress(false)
        .with_measure_time(false)
}

fn parse_pair(tc: &TestCase) -> anyhow::Result<(i64, i64)> {
    let line = tc.read_input()?;
    let mut numbers = line.split_whitespace().map(str::parse::<i64>);
    match (numbers.next(), numbers.next()) {
        (Some(n), Some(m)) => Ok((n?, m?)),
        _ => anyhow::bail!("expected two numbers in {}", tc.name),
    }
}

fn sum(tc: &TestCase) -> anyhow::Result<TestCaseResult> {
    let (n, m) = parse_pair(tc)?;
    Ok(TestCaseResult::accepted()
        .with_stdout(format!("{}\n", n + m))
        .with_attribute("score", n + m))
}

fn abc_inputs(dir: &Path) {
    write_inputs(dir, &[("a.txt", "1 2"), ("b.txt", "3 4"), ("c.txt", "5 6")]);
}

#[tokio::test]
async fn identical_runs_diff_unchanged() {
    let root = tempdir().unwrap();
    let input = root.path().join("in");
    abc_inputs(&input);
    let config = config(&input, &root.path().join("log"));

    let first = run(handler_fn(sum), &config).await.unwrap();
    let second = run(handler_fn(sum), &config).await.unwrap();
    assert_ne!(first.log_folder, second.log_folder);

    let diff = DiffEngine::new()
        .merge(&[first.log.clone(), second.log.clone()])
        .unwrap();

    assert_eq!(diff.row_count(), 3);
    assert!((0..3).all(|row| diff.is_row_unchanged(row)));
    assert_eq!(
        diff.get(0, "testcase.1").and_then(|v| v.as_str()),
        Some("a.txt")
    );
    assert!(diff.compared_columns().iter().any(|c| c == "score"));
}

#[tokio::test]
async fn doubled_score_is_flagged_on_first_row_only() {
    let root = tempdir().unwrap();
    let input = root.path().join("in");
    abc_inputs(&input);
    let config = config(&input, &root.path().join("log"));

    let baseline = run(handler_fn(sum), &config).await.unwrap();
    let doubled = run(
        handler_fn(|tc: &TestCase| {
            let result = sum(tc)?;
            if tc.index % 3 != 0 {
                return Ok(result);
            }
            let score = result
                .attributes
                .get("score")
                .and_then(|v| v.as_f64())
                .unwrap_or_default() as i64;
            Ok(result.with_attribute("score", score * 2))
        }),
        &config,
    )
    .await
    .unwrap();

    let diff = DiffEngine::new()
        .with_direction("score", Direction::HigherIsBetter)
        .merge(&[baseline.log, doubled.log])
        .unwrap();

    assert_eq!(diff.row_count(), 3);
    assert_eq!(diff.change(0, "score", 1), Some(Change::Regressed));
    assert_eq!(diff.change(0, "score", 2), Some(Change::Improved));
    assert_eq!(diff.change(0, "stdout", 2), Some(Change::Unchanged));
    assert!(!diff.is_row_unchanged(0));
    assert!(diff.is_row_unchanged(1));
    assert!(diff.is_row_unchanged(2));
}

#[tokio::test]
async fn disjoint_inputs_share_no_rows() {
    let root = tempdir().unwrap();
    let log_dir = root.path().join("log");
    let left = root.path().join("left");
    let right = root.path().join("right");
    write_inputs(&left, &[("a.txt", "1 1")]);
    write_inputs(&right, &[("a.txt", "2 2")]);

    let first = run(handler_fn(sum), &config(&left, &log_dir)).await.unwrap();
    let second = run(handler_fn(sum), &config(&right, &log_dir)).await.unwrap();

    let diff = DiffEngine::new().merge(&[first.log, second.log]).unwrap();
    assert_eq!(diff.row_count(), 0);
}

#[tokio::test]
async fn failing_testcase_is_isolated() {
    let root = tempdir().unwrap();
    let input = root.path().join("in");
    write_inputs(&input, &[("a.txt", "1 2"), ("b.txt", "1"), ("c.txt", "5 6")]);

    let report = run(handler_fn(sum), &config(&input, &root.path().join("log")))
        .await
        .unwrap();

    let statuses: Vec<_> = (0..3).map(|row| report.log.status(row)).collect();
    assert_eq!(
        statuses,
        vec![
            Some(ResultStatus::Accepted),
            Some(ResultStatus::InternalError),
            Some(ResultStatus::Accepted)
        ]
    );
    let stderr = fs::read_to_string(report.log_folder.join("stderr").join("b.txt")).unwrap();
    assert_eq!(stderr, "expected two numbers in b.txt");
    assert_eq!(report.log.get("score", 1), None);
}

#[tokio::test]
async fn stored_logs_reload_for_diff() {
    let root = tempdir().unwrap();
    let input = root.path().join("in");
    let log_dir = root.path().join("log");
    abc_inputs(&input);
    let config = config(&input, &log_dir).with_repeat_count(2);

    run(handler_fn(sum), &config).await.unwrap();
    run(handler_fn(sum), &config).await.unwrap();

    let storage = LogStorage::new(&log_dir);
    let logs: Vec<_> = storage.discover().into_iter().map(|(_, log)| log).collect();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].row_count(), 6);

    // repeated inputs pair up by occurrence
    let diff = DiffEngine::new().merge(&logs).unwrap();
    assert_eq!(diff.row_count(), 6);
    assert_eq!(
        diff.get(1, "testcase.2").and_then(|v| v.as_str()),
        Some("a_2.txt")
    );

    let saved = storage.save_diff(&diff).unwrap();
    assert!(saved.ends_with("diff.json"));
    assert_eq!(storage.discover().len(), 2);
}
