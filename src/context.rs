//! Build and test contexts: one linear pipeline per invocation.
//!
//! ```text
//! validated options → [install bridging script] → editor arguments
//!   → launch → watch until exit → verdict on log + exit code → [test: parse report] → verdict
//! ```
//!
//! Any failing step ends the invocation; nothing after it runs.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::classify::ClassificationRules;
use crate::editor;
use crate::error::{Error, Result};
use crate::install;
use crate::log::{RunEvent, RunLog};
use crate::options::{BuildOptions, TestOptions};
use crate::report::{self, TestSummary};
use crate::supervisor::{self, EditorProcess, SpawnConfig, SupervisedRun, SupervisorSettings};
use crate::watch::{LogWatch, TracingSink};

/// How the raw editor exit code affects the verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitPolicy {
    /// Fail when the editor exits non-zero even though its log was clean.
    pub fail_on_nonzero_exit: bool,
}

/// Everything shared by both kinds of invocation.
pub struct RunSettings {
    pub rules: ClassificationRules,
    pub supervisor: SupervisorSettings,
    pub exit_policy: ExitPolicy,
    pub run_log: Option<RunLog>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            rules: ClassificationRules::unity_editor(),
            supervisor: SupervisorSettings::default(),
            exit_policy: ExitPolicy::default(),
            run_log: None,
        }
    }
}

impl RunSettings {
    fn record(&self, event: RunEvent) {
        if let Some(log) = &self.run_log {
            if let Err(e) = log.record(event) {
                warn!(error = %e, path = %log.path().display(), "failed to write run log");
            }
        }
    }

    fn finish(&self, failure: Option<&Error>) {
        self.record(RunEvent::InvocationFinished {
            success: failure.is_none(),
            reason: failure.map(|e| e.to_string()),
        });
    }

    /// Launch the editor, watch its log, and turn what was seen into a verdict.
    fn supervise(&self, spawn: &SpawnConfig, editor_log: &Path, echo: bool) -> Result<SupervisedRun> {
        let process = EditorProcess::launch(spawn)?;
        self.record(RunEvent::EditorLaunched {
            program: spawn.program.display().to_string(),
            args: spawn.args.clone(),
            pid: process.id(),
        });

        debug!(editor_log = %editor_log.display(), echo, "watching editor log");
        let mut watch = LogWatch::new(editor_log, self.rules.clone(), echo);
        let run = supervisor::watch_until_exit(process, &mut watch, self.supervisor)?;

        self.record(RunEvent::EditorExited {
            exit_code: run.exit_code,
            log_reported_error: run.log_reported_error,
            log_lines: run.log_lines,
            elapsed_millis: run.elapsed.as_millis(),
        });

        judge(&run, self.exit_policy)?;
        Ok(run)
    }
}

/// Log-derived errors always fail; the exit code only fails under policy.
pub fn judge(run: &SupervisedRun, policy: ExitPolicy) -> Result<()> {
    if run.log_reported_error {
        return Err(Error::EditorLogReportedError);
    }

    match run.exit_code {
        Some(0) => Ok(()),
        Some(code) => {
            warn!(exit_code = code, "editor exited non-zero with a clean log");
            if policy.fail_on_nonzero_exit {
                Err(Error::NonZeroExit(code))
            } else {
                Ok(())
            }
        }
        None => {
            warn!("editor was terminated by a signal");
            Ok(())
        }
    }
}

/// A player build of one project.
pub struct BuildContext {
    options: BuildOptions,
    settings: RunSettings,
}

impl BuildContext {
    pub fn new(options: BuildOptions, settings: RunSettings) -> Self {
        Self { options, settings }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Log every option at info.
    pub fn dump_options(&self) {
        for line in self.options.dump() {
            info!("{line}");
        }
    }

    pub fn build(&self) -> Result<()> {
        self.settings.record(RunEvent::InvocationStarted {
            kind: "build".to_string(),
            project: self.options.project().display().to_string(),
        });
        let outcome = self.run_build();
        self.settings.finish(outcome.as_ref().err());
        outcome
    }

    fn run_build(&self) -> Result<()> {
        install::ensure_script(self.options.project(), self.options.force_script_install())?;

        let spawn = editor::build_spawn_config(&self.options);
        self.settings.supervise(
            &spawn,
            self.options.editor_log(),
            self.options.output_editor_log(),
        )?;

        info!("Build succeeded: {}", self.options.output_path());
        Ok(())
    }
}

/// An edit-mode or play-mode test run of one project.
pub struct TestContext {
    options: TestOptions,
    settings: RunSettings,
}

impl TestContext {
    pub fn new(options: TestOptions, settings: RunSettings) -> Self {
        Self { options, settings }
    }

    pub fn options(&self) -> &TestOptions {
        &self.options
    }

    pub fn dump_options(&self) {
        for line in self.options.dump() {
            info!("{line}");
        }
    }

    /// Run the tests and return the summary when none failed.
    pub fn test(&self) -> Result<TestSummary> {
        self.settings.record(RunEvent::InvocationStarted {
            kind: "test".to_string(),
            project: self.options.project().display().to_string(),
        });
        let outcome = self.run_tests();
        self.settings.finish(outcome.as_ref().err());
        outcome
    }

    fn run_tests(&self) -> Result<TestSummary> {
        delete_stale_results(self.options.results_path())?;

        let spawn = editor::test_spawn_config(&self.options);
        self.settings.supervise(
            &spawn,
            self.options.editor_log(),
            self.options.output_editor_log(),
        )?;

        let summary = report::parse(self.options.results_path())?;
        self.settings.record(RunEvent::ReportParsed { summary });
        summary.emit(&TracingSink);
        summary.ensure_passed()?;
        Ok(summary)
    }
}

/// Remove a results file left by an earlier run so the one parsed afterwards
/// is known to come from this run.
pub fn delete_stale_results(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "deleted stale test results");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::StaleResults {
            path: path.to_path_buf(),
            source,
        }),
    }
}
