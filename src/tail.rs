//! Incremental reads of a log file owned by another process.
//!
//! The editor appends to its log while we poll it. Each poll re-reads the
//! whole file and diffs by line count against a cursor, which keeps the reader
//! trivially correct across late creation, truncation and torn reads at the
//! cost of re-reading the file. Editor logs stay small enough for this.
//!
//! Reads never take a lock that would exclude the writer: on Unix plain
//! opens are always shared, and on Windows `std` opens with
//! `FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE`.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Lines appended since the previous read, plus the cursor to pass next time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailRead {
    pub lines: Vec<String>,
    pub cursor: usize,
}

impl TailRead {
    fn unchanged(cursor: usize) -> Self {
        Self {
            lines: Vec::new(),
            cursor,
        }
    }
}

/// Read the complete lines at index `cursor` and beyond.
///
/// A trailing line without its newline is left for a later read, so a line
/// the writer is halfway through is never split in two. Missing files,
/// read failures and files that shrank below `cursor` all yield no lines and
/// an unchanged cursor.
pub fn read_new_lines(path: &Path, cursor: usize) -> TailRead {
    read_lines(path, cursor, false)
}

/// Like [`read_new_lines`], but also returns an unterminated final line.
///
/// Used for the last read after the writer has exited.
pub fn read_remaining_lines(path: &Path, cursor: usize) -> TailRead {
    read_lines(path, cursor, true)
}

fn read_lines(path: &Path, cursor: usize, include_partial: bool) -> TailRead {
    let content = match read_shared(path) {
        Ok(Some(content)) => content,
        Ok(None) => return TailRead::unchanged(cursor),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "editor log unreadable this poll");
            return TailRead::unchanged(cursor);
        }
    };

    let mut lines: Vec<&str> = content.lines().collect();
    if !include_partial && !content.is_empty() && !content.ends_with('\n') {
        lines.pop();
    }

    if lines.len() <= cursor {
        return TailRead::unchanged(cursor);
    }

    TailRead {
        cursor: lines.len(),
        lines: lines[cursor..].iter().map(|l| l.to_string()).collect(),
    }
}

/// Read the whole file as lossy UTF-8. `Ok(None)` when it does not exist yet.
fn read_shared(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// A file path with its tail cursor for one watch session.
///
/// The cursor starts at zero and only ever moves forward.
#[derive(Debug, Clone)]
pub struct LogTail {
    path: PathBuf,
    cursor: usize,
}

impl LogTail {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            cursor: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Complete lines appended since the last call.
    pub fn next_lines(&mut self) -> Vec<String> {
        let read = read_new_lines(&self.path, self.cursor);
        self.advance(read)
    }

    /// Everything appended since the last call, including a trailing partial line.
    pub fn remaining_lines(&mut self) -> Vec<String> {
        let read = read_remaining_lines(&self.path, self.cursor);
        self.advance(read)
    }

    fn advance(&mut self, read: TailRead) -> Vec<String> {
        debug_assert!(read.cursor >= self.cursor);
        self.cursor = self.cursor.max(read.cursor);
        read.lines
    }
}
