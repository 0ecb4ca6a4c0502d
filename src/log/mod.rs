//! Run log: one JSON object per line for each invocation event.
//!
//! Pipelines that keep build history point `--run-log` at a file and get a
//! machine-readable record of what was launched, how the editor exited and
//! what verdict came out. Each line is self-contained and timestamped.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::debug;

use crate::report::TestSummary;

/// One line in the run log.
#[derive(Debug, Clone, Serialize)]
pub struct RunEntry {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    #[serde(flatten)]
    pub event: RunEvent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum RunEvent {
    /// A build or test invocation began.
    InvocationStarted { kind: String, project: String },
    /// The editor process was spawned.
    EditorLaunched {
        program: String,
        args: Vec<String>,
        pid: u32,
    },
    /// The editor process is gone; `exit_code` is `None` when killed.
    EditorExited {
        exit_code: Option<i32>,
        log_reported_error: bool,
        log_lines: usize,
        elapsed_millis: u128,
    },
    ReportParsed { summary: TestSummary },
    InvocationFinished {
        success: bool,
        reason: Option<String>,
    },
}

/// Append-only JSON lines writer.
pub struct RunLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RunLog {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create run log directory: {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open run log: {}", path.display()))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn record(&self, event: RunEvent) -> Result<()> {
        let entry = RunEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            event,
        };

        let json = serde_json::to_string(&entry).context("failed to serialize run log entry")?;
        debug!(entry = %json, "run log");

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("run log writer lock poisoned"))?;
        writeln!(writer, "{json}").context("failed to write run log entry")?;
        writer.flush().context("failed to flush run log")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
