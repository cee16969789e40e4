//! Output formatting module
//!
//! Renders run logs, diffs and log listings for the terminal.

mod formatter;

pub use formatter::{write_to_file, OutputFormat, ResultFormatter};
