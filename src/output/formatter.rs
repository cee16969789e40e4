//! Output formatters for run logs and diffs
//!
//! Provides table, JSON, CSV and summary renderings.

use anyhow::Context;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use crate::models::ResultStatus;
use crate::results::{
    format_cell, split_suffix, Cell, Change, ColumnKind, LogInfo, LogSummary, MergedDiff,
    RunnerLog, INPUT_HASH_COLUMN,
};

const HASH_PREVIEW: usize = 8;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format the result table of one run
    pub fn format_log(&self, log: &RunnerLog) -> String {
        match self.format {
            OutputFormat::Table => self.format_log_table(log),
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(log),
            OutputFormat::Csv => {
                let columns: Vec<&str> = log.column_names().collect();
                let rows = (0..log.row_count()).map(|row| {
                    columns
                        .iter()
                        .map(|c| log.column(c).and_then(|cells| cells.get(row)).cloned().flatten())
                        .collect::<Vec<Cell>>()
                });
                csv_text(&columns, rows)
            }
            OutputFormat::Summary => self.format_summary(&log.summary(), log.base_dir()),
        }
    }

    fn format_log_table(&self, log: &RunnerLog) -> String {
        let mut header = vec!["testcase".to_string(), "status".to_string()];
        header.extend(log.user_attributes().into_iter().map(str::to_string));

        let rows: Vec<Vec<(String, Option<&'static str>)>> = (0..log.row_count())
            .map(|row| {
                header
                    .iter()
                    .map(|column| {
                        let text = log
                            .column(column)
                            .and_then(|cells| cells.get(row))
                            .map(format_cell)
                            .unwrap_or_default();
                        let color = match column.as_str() {
                            "status" => log.status(row).map(status_color),
                            _ => None,
                        };
                        (text, color)
                    })
                    .collect()
            })
            .collect();

        let mut output = self.render_table(&header, &rows);
        output.push('\n');
        output.push_str(&self.format_summary(&log.summary(), log.base_dir()));
        output
    }

    /// One-paragraph overview of a run
    pub fn format_summary(&self, summary: &LogSummary, folder: &str) -> String {
        if matches!(self.format, OutputFormat::Json | OutputFormat::JsonPretty) {
            return self.json(summary);
        }

        let counts: Vec<String> = summary
            .status_counts
            .iter()
            .map(|(status, count)| {
                self.paint(&format!("{}: {}", status.code(), count), Some(status_color(*status)))
            })
            .collect();

        let mut output = format!("{} | {} testcases | {}", folder, summary.total, counts.join(" "));
        if let Some(score) = summary.average_score {
            let _ = write!(output, " | average score: {score:.3}");
        }
        output
    }

    /// Format a merged diff, marking cells that changed between sources
    pub fn format_diff(&self, diff: &MergedDiff) -> String {
        match self.format {
            OutputFormat::Table => self.format_diff_table(diff),
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(diff),
            OutputFormat::Csv => {
                let columns: Vec<&str> = diff.columns().iter().map(String::as_str).collect();
                csv_text(&columns, diff.rows().map(<[Cell]>::to_vec))
            }
            OutputFormat::Summary => self.format_diff_summary(diff),
        }
    }

    fn format_diff_table(&self, diff: &MergedDiff) -> String {
        let visible: Vec<&String> = diff
            .columns()
            .iter()
            .filter(|column| match split_suffix(column) {
                Some((logical, _)) => ColumnKind::of(logical) != ColumnKind::Url,
                None => true,
            })
            .collect();
        let header: Vec<String> = visible.iter().map(|c| c.to_string()).collect();

        let rows: Vec<Vec<(String, Option<&'static str>)>> = (0..diff.row_count())
            .map(|row| {
                visible
                    .iter()
                    .map(|column| {
                        let mut text = diff
                            .get(row, column)
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        if is_hash_column(column) {
                            text.truncate(HASH_PREVIEW);
                        }
                        match diff.cell_change(row, column) {
                            Some(change) if change != Change::Unchanged => {
                                let (mark, color) = change_mark(change);
                                (format!("{text} {mark}"), Some(color))
                            }
                            _ => (text, None),
                        }
                    })
                    .collect()
            })
            .collect();

        let mut output = format!("Sources: {}\n", numbered_sources(diff));
        output.push_str(&self.render_table(&header, &rows));
        output.push('\n');
        output.push_str(&self.format_diff_summary(diff));
        output
    }

    fn format_diff_summary(&self, diff: &MergedDiff) -> String {
        let unchanged_rows = (0..diff.row_count())
            .filter(|&row| diff.is_row_unchanged(row))
            .count();
        let mut output = format!(
            "{} matched rows across {} logs, {} fully unchanged\n",
            diff.row_count(),
            diff.source_count(),
            unchanged_rows
        );

        for summary in diff.summary() {
            let _ = write!(
                output,
                "  {:<12} unchanged {:>4}  differing {:>4}",
                summary.column, summary.unchanged, summary.differing
            );
            if summary.improved.iter().chain(&summary.regressed).any(|n| *n > 0) {
                let per_source: Vec<String> = summary
                    .improved
                    .iter()
                    .zip(&summary.regressed)
                    .enumerate()
                    .map(|(i, (up, down))| {
                        format!(
                            "#{} {} {}",
                            i + 1,
                            self.paint(&format!("+{up}"), Some(GREEN)),
                            self.paint(&format!("-{down}"), Some(RED))
                        )
                    })
                    .collect();
                let _ = write!(output, "  [{}]", per_source.join(", "));
            }
            output.push('\n');
        }
        output
    }

    /// Format the logs found under a log directory
    pub fn format_log_list(&self, logs: &[LogInfo]) -> String {
        #[derive(Serialize)]
        struct LogEntry<'a> {
            folder: &'a str,
            path: String,
            created_date: String,
            testcase_num: usize,
            average_score: Option<f64>,
        }

        let entries: Vec<LogEntry> = logs
            .iter()
            .map(|info| LogEntry {
                folder: &info.folder,
                path: info.path.display().to_string(),
                created_date: info.created_date.to_rfc3339(),
                testcase_num: info.testcase_num,
                average_score: info.average_score,
            })
            .collect();

        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.json(&entries),
            OutputFormat::Csv => {
                let mut output = String::from("folder,created_date,testcase_num,average_score\n");
                for e in &entries {
                    let score = e.average_score.map(|s| format!("{s:.3}")).unwrap_or_default();
                    let _ = writeln!(
                        output,
                        "{},{},{},{}",
                        e.folder, e.created_date, e.testcase_num, score
                    );
                }
                output
            }
            OutputFormat::Table | OutputFormat::Summary => {
                if entries.is_empty() {
                    return "No result logs found".to_string();
                }
                let header: Vec<String> = ["folder", "created", "testcases", "avg score"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                let rows: Vec<Vec<(String, Option<&'static str>)>> = logs
                    .iter()
                    .map(|info| {
                        vec![
                            (info.folder.clone(), None),
                            (
                                info.created_date
                                    .with_timezone(&chrono::Local)
                                    .format("%Y-%m-%d %H:%M:%S")
                                    .to_string(),
                                None,
                            ),
                            (info.testcase_num.to_string(), None),
                            (
                                info.average_score
                                    .map(|s| format!("{s:.3}"))
                                    .unwrap_or_else(|| "-".to_string()),
                                None,
                            ),
                        ]
                    })
                    .collect();
                self.render_table(&header, &rows)
            }
        }
    }

    /// Aligned text table; colors are applied after padding
    fn render_table(&self, header: &[String], rows: &[Vec<(String, Option<&'static str>)>]) -> String {
        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (i, (text, _)) in row.iter().enumerate() {
                widths[i] = widths[i].max(text.chars().count());
            }
        }

        let mut output = String::new();
        let line: Vec<String> = header
            .iter()
            .zip(&widths)
            .map(|(h, w)| format!("{h:<w$}"))
            .collect();
        output.push_str(line.join(" │ ").trim_end());
        output.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        output.push_str(&rule.join("─┼─"));
        output.push('\n');

        for row in rows {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|((text, color), w)| self.paint(&format!("{text:<w$}"), *color))
                .collect();
            output.push_str(line.join(" │ ").trim_end());
            output.push('\n');
        }
        output
    }

    fn paint(&self, text: &str, color: Option<&str>) -> String {
        match color {
            Some(code) if self.colorize => format!("\x1b[{code}m{text}\x1b[0m"),
            _ => text.to_string(),
        }
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_default()
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";

fn status_color(status: ResultStatus) -> &'static str {
    match status {
        ResultStatus::Accepted => GREEN,
        ResultStatus::Cancelled | ResultStatus::TimeLimitExceeded => YELLOW,
        _ => RED,
    }
}

fn change_mark(change: Change) -> (&'static str, &'static str) {
    match change {
        Change::Improved => ("+", GREEN),
        Change::Regressed => ("-", RED),
        _ => ("*", YELLOW),
    }
}

fn is_hash_column(column: &str) -> bool {
    column == INPUT_HASH_COLUMN
        || split_suffix(column).is_some_and(|(logical, _)| logical.ends_with("_hash"))
}

fn numbered_sources(diff: &MergedDiff) -> String {
    diff.sources()
        .iter()
        .enumerate()
        .map(|(i, s)| format!("#{} {}", i + 1, s))
        .collect::<Vec<_>>()
        .join(", ")
}

fn csv_text<I>(columns: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = Vec<Cell>>,
{
    render_csv(columns, rows).unwrap_or_default()
}

fn render_csv<I>(columns: &[&str], rows: I) -> anyhow::Result<String>
where
    I: IntoIterator<Item = Vec<Cell>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(row.iter().map(format_cell))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Write formatted output to a file
pub fn write_to_file(path: &Path, content: &str) -> anyhow::Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))
}
