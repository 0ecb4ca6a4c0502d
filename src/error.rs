//! Fatal outcomes of a build or test invocation.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::report::ReportError;

/// Why an invocation failed. Every variant is fatal.
#[derive(Error, Debug)]
pub enum Error {
    /// The editor binary is not where the options say it is.
    #[error("the Unity editor location '{}' does not exist", .0.display())]
    EditorNotFound(PathBuf),

    /// No editor location was given at all.
    #[error("the Unity editor location is not set (pass --editor or set [editor] location)")]
    EditorNotSet,

    /// The project folder does not exist.
    #[error("the Unity project folder '{}' does not exist", .0.display())]
    ProjectNotFound(PathBuf),

    /// A build was requested without an output path.
    #[error("the output path build option must be set")]
    MissingOutputPath,

    /// An option value would break the editor's argument parsing.
    #[error("the {option} '{value}' can not contain any spaces")]
    ContainsWhitespace { option: &'static str, value: String },

    /// The Android version code is out of range.
    #[error("the build version code {0} must be between 0 and 100000")]
    VersionCodeOutOfRange(u32),

    /// The editor log location could not be worked out on this machine.
    #[error("failed to find the Unity editor log location: {0}")]
    EditorLogLocation(String),

    /// A previous run's results file is in the way and could not be removed.
    #[error("failed to delete the existing test results file '{}'", .path.display())]
    StaleResults {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bridging build script could not be written into the project.
    #[error("failed to install the automated build script to '{}'", .path.display())]
    ScriptInstall {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The editor process could not be started.
    #[error("failed to launch the Unity editor '{}'", .program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the editor process failed.
    #[error("failed to wait for the Unity editor process")]
    Wait(#[source] std::io::Error),

    /// The editor outlived the configured deadline and was killed.
    #[error("the Unity editor did not exit within {0:?} and was terminated")]
    Timeout(Duration),

    /// An error line was seen in the editor log, whatever the exit code.
    #[error("an error was reported in the Unity editor log")]
    EditorLogReportedError,

    /// The editor exited non-zero and the policy says that fails the run.
    #[error("the Unity editor exited with code {0}")]
    NonZeroExit(i32),

    /// The result report is missing or malformed.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// The report parsed, but some tests failed.
    #[error("a total of {failed} of a possible {total} tests have failed")]
    TestsFailed { failed: u32, total: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
