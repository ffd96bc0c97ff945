//! Build log sinks
//!
//! The build log is what a user reads in the CI console. Diagnostics go
//! through `tracing` instead and never land here.

use colored::Colorize;

/// How a build log line should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Progress,
    Success,
    Skip,
    Failure,
}

/// Line-oriented sink for human-readable progress
pub trait BuildLog {
    fn println(&mut self, kind: LineKind, line: &str);

    fn progress(&mut self, line: &str) {
        self.println(LineKind::Progress, line);
    }

    fn success(&mut self, line: &str) {
        self.println(LineKind::Success, line);
    }

    fn skip(&mut self, line: &str) {
        self.println(LineKind::Skip, line);
    }

    fn failure(&mut self, line: &str) {
        self.println(LineKind::Failure, line);
    }
}

/// Writes colored lines to stdout
#[derive(Debug, Default)]
pub struct ConsoleLog;

impl BuildLog for ConsoleLog {
    fn println(&mut self, kind: LineKind, line: &str) {
        match kind {
            LineKind::Progress => println!("{} {}", "→".blue(), line),
            LineKind::Success => println!("{} {}", "✓".green().bold(), line),
            LineKind::Skip => println!("{} {}", "○".dimmed(), line.dimmed()),
            LineKind::Failure => println!("{} {}", "✗".red().bold(), line.red()),
        }
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Vec<String>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True if any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl BuildLog for MemoryLog {
    fn println(&mut self, _kind: LineKind, line: &str) {
        self.lines.push(line.to_string());
    }
}
