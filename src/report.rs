//! NUnit test result report produced by `-runTests`.
//!
//! Only the summary counters on the root `<test-run>` element are read.
//! Each missing or non-numeric counter fails with its own error so a broken
//! report points at the exact attribute.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::classify::Severity;
use crate::error::Error;
use crate::watch::LogSink;

/// Root element every report must have.
pub const ROOT_ELEMENT: &str = "test-run";

/// Counter attributes read from the root element, in report order.
pub const COUNTERS: [&str; 5] = ["total", "passed", "failed", "inconclusive", "skipped"];

/// Why a result report could not be turned into a [`TestSummary`].
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("no test result file exists at '{}' to generate a report from", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read test results from '{}'", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("badly formatted test results within '{}': {source}", .path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error(
        "badly formatted test results within '{}', root 'test-run' element does not exist (found '{found}')",
        .path.display()
    )]
    UnexpectedRoot { path: PathBuf, found: String },

    #[error(
        "badly formatted test results within '{}', '{attribute}' attribute on 'test-run' element does not exist",
        .path.display()
    )]
    MissingAttribute {
        path: PathBuf,
        attribute: &'static str,
    },

    #[error(
        "badly formatted test results within '{}', '{attribute}' attribute on 'test-run' element is not a non-negative integer: '{value}'",
        .path.display()
    )]
    InvalidAttribute {
        path: PathBuf,
        attribute: &'static str,
        value: String,
    },
}

impl ReportError {
    /// The counter attribute this error is about, if any.
    pub fn attribute(&self) -> Option<&'static str> {
        match self {
            ReportError::MissingAttribute { attribute, .. }
            | ReportError::InvalidAttribute { attribute, .. } => Some(*attribute),
            _ => None,
        }
    }
}

/// Counters from one test run. Built once from a report, never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TestSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub inconclusive: u32,
    pub skipped: u32,
}

impl TestSummary {
    /// Fail when any test failed.
    pub fn ensure_passed(&self) -> Result<(), Error> {
        if self.failed > 0 {
            return Err(Error::TestsFailed {
                failed: self.failed,
                total: self.total,
            });
        }
        Ok(())
    }

    /// Human-readable report, one line per entry.
    pub fn report_lines(&self) -> Vec<String> {
        vec![
            String::new(),
            "========================================".to_string(),
            "Test Results Report".to_string(),
            "========================================".to_string(),
            format!("- Total: {}", self.total),
            format!("- Passed: {}", self.passed),
            format!("- Failed: {}", self.failed),
            format!("- Inconclusive: {}", self.inconclusive),
            format!("- Skipped: {}", self.skipped),
            String::new(),
        ]
    }

    /// Write the report to `sink` at info severity.
    pub fn emit(&self, sink: &dyn LogSink) {
        for line in self.report_lines() {
            sink.emit(Severity::Info, &line);
        }
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} passed, {} failed, {} inconclusive, {} skipped",
            self.total, self.passed, self.failed, self.inconclusive, self.skipped
        )
    }
}

/// Load the report at `path` and extract its summary counters.
pub fn parse(path: &Path) -> Result<TestSummary, ReportError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ReportError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(ReportError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    parse_str(path, &text)
}

/// Parse report text. `path` is only used in error messages.
pub fn parse_str(path: &Path, text: &str) -> Result<TestSummary, ReportError> {
    let document = roxmltree::Document::parse(text).map_err(|source| ReportError::Xml {
        path: path.to_path_buf(),
        source,
    })?;

    let root = document.root_element();
    if root.tag_name().name() != ROOT_ELEMENT {
        return Err(ReportError::UnexpectedRoot {
            path: path.to_path_buf(),
            found: root.tag_name().name().to_string(),
        });
    }

    let counter = |attribute: &'static str| -> Result<u32, ReportError> {
        let value = root
            .attribute(attribute)
            .ok_or_else(|| ReportError::MissingAttribute {
                path: path.to_path_buf(),
                attribute,
            })?;
        value
            .trim()
            .parse::<u32>()
            .map_err(|_| ReportError::InvalidAttribute {
                path: path.to_path_buf(),
                attribute,
                value: value.to_string(),
            })
    };

    Ok(TestSummary {
        total: counter("total")?,
        passed: counter("passed")?,
        failed: counter("failed")?,
        inconclusive: counter("inconclusive")?,
        skipped: counter("skipped")?,
    })
}
