//! Whole build and test invocations against a fake editor.
//!
//! The fake editor is a shell script that appends to a log file and, for
//! test runs, writes an NUnit results file to the `-testResults` path.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serial_test::serial;
use unity_ci::Error;
use unity_ci::context::{BuildContext, ExitPolicy, RunSettings, TestContext};
use unity_ci::install;
use unity_ci::log::RunLog;
use unity_ci::options::{BuildOptions, BuildRequest, TestOptions, TestRequest};
use unity_ci::report::ReportError;
use unity_ci::supervisor::SupervisorSettings;

struct Workspace {
    tmp: tempfile::TempDir,
    project: PathBuf,
    log: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("Game");
        fs::create_dir_all(project.join("Assets")).unwrap();
        let log = tmp.path().join("Editor.log");
        Self { tmp, project, log }
    }

    /// Write the fake editor. `log_lines` go to the editor log, then the
    /// script exits with `exit_code`. When `results` is set it is written to
    /// the path following `-testResults`.
    fn editor(&self, log_lines: &[&str], results: Option<&str>, exit_code: i32) -> PathBuf {
        let mut body = String::from("#!/bin/sh\n");
        body.push_str("RESULTS=\"\"\n");
        body.push_str(
            "while [ $# -gt 0 ]; do\n  if [ \"$1\" = \"-testResults\" ]; then RESULTS=\"$2\"; fi\n  shift\ndone\n",
        );
        body.push_str(&format!(": > '{}'\n", self.log.display()));
        for line in log_lines {
            body.push_str(&format!("echo '{line}' >> '{}'\n", self.log.display()));
        }
        if let Some(xml) = results {
            body.push_str(&format!("cat > \"$RESULTS\" <<'XML'\n{xml}\nXML\n"));
        }
        body.push_str(&format!("exit {exit_code}\n"));

        let path = self.tmp.path().join("Unity");
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn build_options(&self, editor: PathBuf) -> BuildOptions {
        BuildOptions::validate(BuildRequest {
            output_path: Some("Builds/game.exe".to_string()),
            editor: Some(editor),
            editor_log: Some(self.log.clone()),
            ..BuildRequest::new(&self.project)
        })
        .unwrap()
    }

    fn test_options(&self, editor: PathBuf) -> TestOptions {
        TestOptions::validate(TestRequest {
            editor: Some(editor),
            editor_log: Some(self.log.clone()),
            ..TestRequest::new(&self.project)
        })
        .unwrap()
    }

    fn results_path(&self) -> PathBuf {
        self.project.join("test_results.xml")
    }
}

fn settings() -> RunSettings {
    RunSettings {
        supervisor: SupervisorSettings {
            poll_interval: Duration::from_millis(10),
            timeout: Some(Duration::from_secs(30)),
        },
        ..RunSettings::default()
    }
}

fn results_xml(total: u32, passed: u32, failed: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<test-run id="2" total="{total}" passed="{passed}" failed="{failed}" inconclusive="0" skipped="0" result="Passed">
</test-run>"#
    )
}

fn read_run_log(path: &Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
#[serial]
fn build_with_clean_log_succeeds_and_installs_script() {
    let ws = Workspace::new();
    let editor = ws.editor(
        &["Loading project", "[unity-ci] Building StandaloneWindows64", "Build succeeded"],
        None,
        0,
    );

    let context = BuildContext::new(ws.build_options(editor), settings());
    context.build().unwrap();

    assert!(install::has_script(&ws.project));
}

#[test]
#[serial]
fn build_fails_on_logged_error_despite_zero_exit() {
    let ws = Workspace::new();
    let editor = ws.editor(&["Starting...", "WARNING: deprecated API", "Build Failed: see above"], None, 0);

    let err = BuildContext::new(ws.build_options(editor), settings())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::EditorLogReportedError));
}

#[test]
#[serial]
fn quiet_log_still_detects_errors() {
    let ws = Workspace::new();
    let editor = ws.editor(
        &["Assets/Player.cs(10,4): error CS0103: The name foo does not exist"],
        None,
        0,
    );
    let options = BuildOptions::validate(BuildRequest {
        output_path: Some("out".to_string()),
        editor: Some(editor),
        editor_log: Some(ws.log.clone()),
        output_editor_log: false,
        ..BuildRequest::new(&ws.project)
    })
    .unwrap();

    let err = BuildContext::new(options, settings()).build().unwrap_err();
    assert!(matches!(err, Error::EditorLogReportedError));
}

#[test]
#[serial]
fn nonzero_exit_with_clean_log_fails_only_under_policy() {
    let ws = Workspace::new();
    let editor = ws.editor(&["Build succeeded"], None, 2);

    BuildContext::new(ws.build_options(editor.clone()), settings())
        .build()
        .unwrap();

    let strict = RunSettings {
        exit_policy: ExitPolicy {
            fail_on_nonzero_exit: true,
        },
        ..settings()
    };
    let err = BuildContext::new(ws.build_options(editor), strict)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::NonZeroExit(2)));
}

#[test]
#[serial]
fn passing_test_run_returns_summary() {
    let ws = Workspace::new();
    let editor = ws.editor(&["Running tests"], Some(&results_xml(4, 4, 0)), 0);

    let summary = TestContext::new(ws.test_options(editor), settings())
        .test()
        .unwrap();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.passed, 4);
    assert_eq!(summary.failed, 0);
}

#[test]
#[serial]
fn failed_tests_fail_the_invocation_with_counts() {
    let ws = Workspace::new();
    let editor = ws.editor(&["Running tests"], Some(&results_xml(10, 8, 2)), 0);

    let err = TestContext::new(ws.test_options(editor), settings())
        .test()
        .unwrap_err();
    assert!(matches!(err, Error::TestsFailed { failed: 2, total: 10 }));
    assert!(err.to_string().contains("2 of a possible 10"));
}

#[test]
#[serial]
fn stale_results_never_count_for_a_new_run() {
    let ws = Workspace::new();
    fs::write(ws.results_path(), results_xml(3, 3, 0)).unwrap();
    let editor = ws.editor(&["Running tests"], None, 0);

    let err = TestContext::new(ws.test_options(editor), settings())
        .test()
        .unwrap_err();
    assert!(matches!(err, Error::Report(ReportError::NotFound { .. })));
}

#[test]
#[serial]
fn log_error_stops_before_report_is_read() {
    let ws = Workspace::new();
    let editor = ws.editor(
        &["Scripts have compiler errors."],
        Some(&results_xml(1, 1, 0)),
        0,
    );

    let err = TestContext::new(ws.test_options(editor), settings())
        .test()
        .unwrap_err();
    assert!(matches!(err, Error::EditorLogReportedError));
}

#[test]
#[serial]
fn run_log_records_the_invocation() {
    let ws = Workspace::new();
    let editor = ws.editor(&["Running tests"], Some(&results_xml(2, 1, 1)), 0);
    let run_log_path = ws.tmp.path().join("logs").join("run.jsonl");
    let settings = RunSettings {
        run_log: Some(RunLog::open(&run_log_path).unwrap()),
        ..settings()
    };

    TestContext::new(ws.test_options(editor), settings)
        .test()
        .unwrap_err();

    let entries = read_run_log(&run_log_path);
    let events: Vec<&str> = entries
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(
        events,
        vec![
            "invocation_started",
            "editor_launched",
            "editor_exited",
            "report_parsed",
            "invocation_finished"
        ]
    );
    assert!(entries[1]["data"]["pid"].as_u64().unwrap() > 0);
    let finished = &entries[4]["data"];
    assert_eq!(finished["success"], false);
    assert!(finished["reason"].as_str().unwrap().contains("1 of a possible 2"));
}

#[test]
#[serial]
fn editor_missing_at_launch_is_not_recorded_as_launched() {
    let ws = Workspace::new();
    let editor = ws.editor(&["Build succeeded"], None, 0);
    let options = ws.build_options(editor.clone());
    fs::remove_file(&editor).unwrap();

    let run_log_path = ws.tmp.path().join("run.jsonl");
    let settings = RunSettings {
        run_log: Some(RunLog::open(&run_log_path).unwrap()),
        ..settings()
    };
    let err = BuildContext::new(options, settings).build().unwrap_err();
    assert!(matches!(err, Error::EditorNotFound(_)));

    let entries = read_run_log(&run_log_path);
    let events: Vec<&str> = entries
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(events, vec!["invocation_started", "invocation_finished"]);
    assert_eq!(entries[1]["data"]["success"], false);
}

#[test]
#[serial]
fn hung_editor_is_killed_at_the_deadline() {
    let ws = Workspace::new();
    let path = ws.tmp.path().join("Unity");
    fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

    let settings = RunSettings {
        supervisor: SupervisorSettings {
            poll_interval: Duration::from_millis(10),
            timeout: Some(Duration::from_millis(200)),
        },
        ..RunSettings::default()
    };
    let err = BuildContext::new(ws.build_options(path), settings)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
}
