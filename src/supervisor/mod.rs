//! Editor process supervision.
//!
//! Spawns the editor headless with no console and no captured streams (it
//! reports through its log file, not stdout), then drives the log watch on a
//! fixed cadence until the process exits:
//!
//! ```text
//! spawn → loop { sleep(poll_interval); watch.poll_once() } until exited
//!       → watch.flush() → SupervisedRun
//! ```
//!
//! Whether the run failed is decided by the caller. The log-derived error flag
//! outranks the exit code: the editor can exit 0 after logging a failure.

use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::watch::{LogSink, LogWatch};

/// Default cadence between log polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How to launch the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: Option<PathBuf>,
}

impl SpawnConfig {
    /// Printable command line, for logs only.
    pub fn display_command(&self) -> String {
        let mut line = format!("\"{}\"", self.program.display());
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Loop timing for one supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub poll_interval: Duration,
    /// Kill the editor once this much time has passed. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// What the supervisor observed once the editor exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisedRun {
    /// Raw exit code, `None` when killed by a signal.
    pub exit_code: Option<i32>,
    /// Any log line classified as an error during the run.
    pub log_reported_error: bool,
    /// Number of log lines processed.
    pub log_lines: usize,
    pub elapsed: Duration,
}

/// A running editor process. Owned by the supervisor from launch to exit.
///
/// Dropped before it was reaped, the process is killed.
pub struct EditorProcess {
    child: Child,
    started: Instant,
    reaped: bool,
}

impl EditorProcess {
    /// Launch the editor detached from any console.
    pub fn launch(spawn: &SpawnConfig) -> Result<Self> {
        if !spawn.program.is_file() {
            return Err(Error::EditorNotFound(spawn.program.clone()));
        }

        let mut cmd = Command::new(&spawn.program);
        cmd.args(&spawn.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &spawn.work_dir {
            cmd.current_dir(dir);
        }
        hide_console(&mut cmd);

        info!("Running: {}", spawn.display_command());
        let child = cmd.spawn().map_err(|source| Error::Launch {
            program: spawn.program.clone(),
            source,
        })?;
        debug!(pid = child.id(), "editor process started");

        Ok(Self {
            child,
            started: Instant::now(),
            reaped: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Exit status if the process has exited, without blocking.
    pub fn try_exit(&mut self) -> Result<Option<ExitStatus>> {
        let status = self.child.try_wait().map_err(Error::Wait)?;
        self.reaped |= status.is_some();
        Ok(status)
    }

    pub fn is_alive(&mut self) -> Result<bool> {
        Ok(self.try_exit()?.is_none())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Terminate the process out-of-band and reap it.
    pub fn kill(&mut self) -> Result<ExitStatus> {
        if let Err(e) = self.child.kill() {
            // Already exited between the last poll and now
            debug!(error = %e, "kill on editor process failed");
        }
        let status = self.child.wait().map_err(Error::Wait)?;
        self.reaped = true;
        Ok(status)
    }
}

impl Drop for EditorProcess {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        debug!(pid = self.child.id(), "killing editor process left running");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(windows)]
fn hide_console(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_cmd: &mut Command) {}

/// Launch the editor and watch its log until it exits.
pub fn run<S: LogSink>(
    spawn: &SpawnConfig,
    watch: &mut LogWatch<S>,
    settings: SupervisorSettings,
) -> Result<SupervisedRun> {
    let process = EditorProcess::launch(spawn)?;
    watch_until_exit(process, watch, settings)
}

/// Watch the log of an already launched editor until it exits or the
/// deadline passes.
pub fn watch_until_exit<S: LogSink>(
    mut process: EditorProcess,
    watch: &mut LogWatch<S>,
    settings: SupervisorSettings,
) -> Result<SupervisedRun> {
    let status = loop {
        if let Some(status) = process.try_exit()? {
            break status;
        }

        std::thread::sleep(settings.poll_interval);
        watch.poll_once();

        if let Some(limit) = settings.timeout {
            if process.elapsed() >= limit {
                warn!(pid = process.id(), ?limit, "editor exceeded its deadline, terminating");
                process.kill()?;
                watch.flush();
                return Err(Error::Timeout(limit));
            }
        }
    };

    // Trailing output written between the last poll and exit
    watch.flush();

    let run = SupervisedRun {
        exit_code: status.code(),
        log_reported_error: watch.saw_error(),
        log_lines: watch.lines_seen(),
        elapsed: process.elapsed(),
    };
    info!(
        exit_code = ?run.exit_code,
        log_reported_error = run.log_reported_error,
        log_lines = run.log_lines,
        elapsed_ms = run.elapsed.as_millis() as u64,
        "editor process exited"
    );
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationRules;
    use crate::watch::tests::RecordingSink;

    #[test]
    fn default_settings_poll_every_100ms() {
        let settings = SupervisorSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_millis(100));
        assert!(settings.timeout.is_none());
    }

    #[test]
    fn display_command_quotes_program() {
        let spawn = SpawnConfig {
            program: PathBuf::from("/opt/Unity/Editor/Unity"),
            args: vec!["-batchmode".to_string(), "-quit".to_string()],
            work_dir: None,
        };
        assert_eq!(
            spawn.display_command(),
            "\"/opt/Unity/Editor/Unity\" -batchmode -quit"
        );
    }

    #[test]
    fn missing_program_fails_before_spawning() {
        let tmp = tempfile::tempdir().unwrap();
        let spawn = SpawnConfig {
            program: tmp.path().join("Unity"),
            args: vec![],
            work_dir: None,
        };
        let mut watch = LogWatch::with_sink(
            &tmp.path().join("Editor.log"),
            ClassificationRules::unity_editor(),
            true,
            RecordingSink::default(),
        );

        let err = run(&spawn, &mut watch, SupervisorSettings::default()).unwrap_err();
        assert!(matches!(err, Error::EditorNotFound(_)));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        use serial_test::serial;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-editor.sh");
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn fast() -> SupervisorSettings {
            SupervisorSettings {
                poll_interval: Duration::from_millis(10),
                timeout: Some(Duration::from_secs(20)),
            }
        }

        #[test]
        #[serial]
        fn clean_exit_with_error_line_reports_log_error() {
            let tmp = tempfile::tempdir().unwrap();
            let log = tmp.path().join("Editor.log");
            let program = script(
                tmp.path(),
                &format!(
                    "echo 'Starting...' >> '{0}'\nsleep 0.1\necho 'Build Failed: see above' >> '{0}'\nexit 0",
                    log.display()
                ),
            );
            let spawn = SpawnConfig {
                program,
                args: vec![],
                work_dir: None,
            };
            let sink = RecordingSink::default();
            let mut watch =
                LogWatch::with_sink(&log, ClassificationRules::unity_editor(), true, sink.clone());

            let result = run(&spawn, &mut watch, fast()).unwrap();
            assert_eq!(result.exit_code, Some(0));
            assert!(result.log_reported_error);
            assert_eq!(result.log_lines, 2);
            assert_eq!(sink.lines.borrow().len(), 2);
        }

        #[test]
        #[serial]
        fn output_written_just_before_exit_is_flushed() {
            let tmp = tempfile::tempdir().unwrap();
            let log = tmp.path().join("Editor.log");
            let program = script(
                tmp.path(),
                &format!("printf 'one\\ntwo\\nBuild Failed' >> '{}'", log.display()),
            );
            let spawn = SpawnConfig {
                program,
                args: vec![],
                work_dir: None,
            };
            let mut watch = LogWatch::with_sink(
                &log,
                ClassificationRules::unity_editor(),
                false,
                RecordingSink::default(),
            );

            let result = run(&spawn, &mut watch, fast()).unwrap();
            assert!(result.log_reported_error);
            assert_eq!(result.log_lines, 3);
        }

        #[test]
        #[serial]
        fn non_zero_exit_is_reported_not_judged() {
            let tmp = tempfile::tempdir().unwrap();
            let log = tmp.path().join("Editor.log");
            let program = script(tmp.path(), "exit 3");
            let spawn = SpawnConfig {
                program,
                args: vec![],
                work_dir: None,
            };
            let mut watch = LogWatch::with_sink(
                &log,
                ClassificationRules::unity_editor(),
                true,
                RecordingSink::default(),
            );

            let result = run(&spawn, &mut watch, fast()).unwrap();
            assert_eq!(result.exit_code, Some(3));
            assert!(!result.log_reported_error);
        }

        #[test]
        #[serial]
        fn arguments_and_work_dir_reach_the_process() {
            let tmp = tempfile::tempdir().unwrap();
            let log = tmp.path().join("Editor.log");
            let program = script(
                tmp.path(),
                &format!("echo \"$1 $2 $(pwd)\" >> '{}'", log.display()),
            );
            let work_dir = tmp.path().join("Game");
            fs::create_dir_all(&work_dir).unwrap();
            let spawn = SpawnConfig {
                program,
                args: vec!["-batchmode".to_string(), "-quit".to_string()],
                work_dir: Some(work_dir.clone()),
            };
            let sink = RecordingSink::default();
            let mut watch =
                LogWatch::with_sink(&log, ClassificationRules::unity_editor(), true, sink.clone());

            run(&spawn, &mut watch, fast()).unwrap();
            let lines = sink.lines.borrow();
            assert_eq!(lines.len(), 1);
            assert!(lines[0].1.starts_with("-batchmode -quit "));
            assert!(lines[0].1.ends_with("Game"));
        }

        #[test]
        #[serial]
        fn deadline_kills_a_hung_editor() {
            let tmp = tempfile::tempdir().unwrap();
            let log = tmp.path().join("Editor.log");
            let program = script(tmp.path(), "exec sleep 30");
            let spawn = SpawnConfig {
                program,
                args: vec![],
                work_dir: None,
            };
            let mut watch = LogWatch::with_sink(
                &log,
                ClassificationRules::unity_editor(),
                true,
                RecordingSink::default(),
            );
            let settings = SupervisorSettings {
                poll_interval: Duration::from_millis(10),
                timeout: Some(Duration::from_millis(200)),
            };

            let started = Instant::now();
            let err = run(&spawn, &mut watch, settings).unwrap_err();
            assert!(matches!(err, Error::Timeout(_)));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[test]
        #[serial]
        fn liveness_tracks_the_process() {
            let tmp = tempfile::tempdir().unwrap();
            let program = script(tmp.path(), "exec sleep 30");
            let spawn = SpawnConfig {
                program,
                args: vec![],
                work_dir: None,
            };

            let mut process = EditorProcess::launch(&spawn).unwrap();
            assert!(process.is_alive().unwrap());
            process.kill().unwrap();
            assert!(!process.is_alive().unwrap());
        }

        fn process_exists(pid: u32) -> bool {
            std::process::Command::new("kill")
                .args(["-0", &pid.to_string()])
                .stderr(Stdio::null())
                .status()
                .unwrap()
                .success()
        }

        #[test]
        #[serial]
        fn dropping_an_unreaped_process_kills_it() {
            let tmp = tempfile::tempdir().unwrap();
            let program = script(tmp.path(), "exec sleep 30");
            let spawn = SpawnConfig {
                program,
                args: vec![],
                work_dir: None,
            };

            let process = EditorProcess::launch(&spawn).unwrap();
            let pid = process.id();
            assert!(process_exists(pid));

            drop(process);
            assert!(!process_exists(pid));
        }

        #[test]
        #[serial]
        fn watching_a_launched_process_reports_its_exit() {
            let tmp = tempfile::tempdir().unwrap();
            let log = tmp.path().join("Editor.log");
            let program = script(
                tmp.path(),
                &format!("echo 'Build succeeded' >> '{}'\nexit 0", log.display()),
            );
            let spawn = SpawnConfig {
                program,
                args: vec![],
                work_dir: None,
            };
            let mut watch = LogWatch::with_sink(
                &log,
                ClassificationRules::unity_editor(),
                true,
                RecordingSink::default(),
            );

            let process = EditorProcess::launch(&spawn).unwrap();
            let result = watch_until_exit(process, &mut watch, fast()).unwrap();
            assert_eq!(result.exit_code, Some(0));
            assert!(!result.log_reported_error);
            assert_eq!(result.log_lines, 1);
        }
    }
}
