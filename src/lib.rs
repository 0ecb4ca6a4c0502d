//! Headless Unity editor builds and test runs for CI pipelines.
//!
//! The editor reports success or failure only through its log file, so an
//! invocation is judged by tailing that log while the editor runs, then (for
//! test runs) by the NUnit results file it leaves behind.

pub mod classify;
pub mod config;
pub mod context;
pub mod editor;
pub mod error;
pub mod install;
pub mod log;
pub mod options;
pub mod report;
pub mod supervisor;
pub mod tail;
pub mod watch;

pub use error::{Error, Result};
