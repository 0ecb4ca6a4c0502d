//! Log watch loop: tail, classify, route, and remember errors.
//!
//! One [`LogWatch`] lives for one editor invocation. The supervisor calls
//! [`LogWatch::poll_once`] on every tick while the editor is alive and
//! [`LogWatch::flush`] once after it exits. The session error flag is the OR
//! of every step and is never cleared.
//!
//! With echo off only error lines reach the sink.

use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::classify::{ClassificationRules, Severity};
use crate::tail::LogTail;

/// Destination for classified editor log lines.
///
/// The surrounding system decides formatting and where lines end up.
pub trait LogSink {
    fn emit(&self, severity: Severity, line: &str);
}

/// Routes each severity to the matching `tracing` level on the `editor` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, severity: Severity, line: &str) {
        match severity {
            Severity::Debug => debug!(target: "editor", "{line}"),
            Severity::Info => info!(target: "editor", "{line}"),
            Severity::Warning => warn!(target: "editor", "{line}"),
            Severity::Error => error!(target: "editor", "{line}"),
        }
    }
}

/// Per-session watch state over the editor log.
pub struct LogWatch<S: LogSink = TracingSink> {
    tail: LogTail,
    rules: ClassificationRules,
    echo: bool,
    sink: S,
    saw_error: bool,
    lines_seen: usize,
}

impl LogWatch<TracingSink> {
    pub fn new(path: &Path, rules: ClassificationRules, echo: bool) -> Self {
        Self::with_sink(path, rules, echo, TracingSink)
    }
}

impl<S: LogSink> LogWatch<S> {
    pub fn with_sink(path: &Path, rules: ClassificationRules, echo: bool, sink: S) -> Self {
        Self {
            tail: LogTail::new(path),
            rules,
            echo,
            sink,
            saw_error: false,
            lines_seen: 0,
        }
    }

    /// Process complete lines appended since the last step.
    ///
    /// Returns whether this step saw an error line.
    pub fn poll_once(&mut self) -> bool {
        let lines = self.tail.next_lines();
        self.process(lines)
    }

    /// Final step after the writer exited; also takes an unterminated last line.
    pub fn flush(&mut self) -> bool {
        let lines = self.tail.remaining_lines();
        self.process(lines)
    }

    fn process(&mut self, lines: Vec<String>) -> bool {
        let mut step_error = false;

        for line in &lines {
            let severity = self.rules.classify(line);
            if severity == Severity::Error {
                step_error = true;
            }
            if self.echo || severity == Severity::Error {
                self.sink.emit(severity, line);
            }
        }

        if !lines.is_empty() {
            self.lines_seen += lines.len();
            debug!(
                new_lines = lines.len(),
                cursor = self.tail.cursor(),
                step_error,
                "processed editor log lines"
            );
        }

        self.saw_error |= step_error;
        step_error
    }

    /// Whether any step in this session saw an error line.
    pub fn saw_error(&self) -> bool {
        self.saw_error
    }

    pub fn cursor(&self) -> usize {
        self.tail.cursor()
    }

    pub fn lines_seen(&self) -> usize {
        self.lines_seen
    }

    pub fn path(&self) -> &Path {
        self.tail.path()
    }
}
