//! Timing helpers
//!
//! Wall-clock measurement for single testcases and for the phases of a run.

use std::time::{Duration, Instant};

/// Measures one labelled span
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop and return the elapsed time, tracing it
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::trace!("{} took {:.3}s", self.label, elapsed.as_secs_f64());
        elapsed
    }
}

/// Records named phases of a run
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    laps: Vec<(String, Duration)>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            laps: Vec::new(),
        }
    }

    /// Close the current phase under `label`
    pub fn lap(&mut self, label: impl Into<String>) {
        self.laps.push((label.into(), self.start.elapsed()));
    }

    pub fn total(&self) -> Duration {
        self.start.elapsed()
    }

    /// Duration of each phase on its own
    pub fn lap_times(&self) -> Vec<(&str, Duration)> {
        let mut prev = Duration::ZERO;
        self.laps
            .iter()
            .map(|(label, cumulative)| {
                let lap = cumulative.saturating_sub(prev);
                prev = *cumulative;
                (label.as_str(), lap)
            })
            .collect()
    }

    pub fn format(&self) -> String {
        let mut lines: Vec<String> = self
            .lap_times()
            .into_iter()
            .map(|(label, d)| format!("{}: {:.3}s", label, d.as_secs_f64()))
            .collect();
        lines.push(format!("total: {:.3}s", self.total().as_secs_f64()));
        lines.join("\n")
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
