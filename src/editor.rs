//! Unity editor command lines and log location.
//!
//! The editor is always driven headless: `-batchmode` with no graphics
//! device where possible. Build runs go through the bridging script's
//! `UnityCi.AutomatedBuild.Build` method; double-hyphen flags are read by
//! that script, not by the editor.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::options::{BuildOptions, TestOptions};
use crate::supervisor::SpawnConfig;

/// Static method the bridging script exposes for `-executeMethod`.
pub const BUILD_METHOD: &str = "UnityCi.AutomatedBuild.Build";

/// Where the editor writes `Editor.log` for the current user on this OS.
pub fn default_log_location() -> Result<PathBuf> {
    log_location_for(std::env::consts::OS, |key| std::env::var(key).ok())
}

fn log_location_for<F>(os: &str, env: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());

    match os {
        "windows" => {
            let local = non_empty("LOCALAPPDATA").ok_or_else(|| {
                Error::EditorLogLocation("the 'LOCALAPPDATA' directory is not set".to_string())
            })?;
            Ok(PathBuf::from(local)
                .join("Unity")
                .join("Editor")
                .join("Editor.log"))
        }
        "macos" => {
            let home = non_empty("HOME").ok_or_else(|| {
                Error::EditorLogLocation("the 'HOME' directory is not set".to_string())
            })?;
            Ok(PathBuf::from(home)
                .join("Library")
                .join("Logs")
                .join("Unity")
                .join("Editor.log"))
        }
        _ => {
            let config_home = match non_empty("XDG_CONFIG_HOME") {
                Some(dir) => PathBuf::from(dir),
                None => {
                    let home = non_empty("HOME").ok_or_else(|| {
                        Error::EditorLogLocation("the 'HOME' directory is not set".to_string())
                    })?;
                    PathBuf::from(home).join(".config")
                }
            };
            Ok(config_home.join("unity3d").join("Editor.log"))
        }
    }
}

/// Editor arguments for a player build.
pub fn build_arguments(options: &BuildOptions) -> Vec<String> {
    let mut args = vec![
        "-batchmode".to_string(),
        "-quit".to_string(),
        "-projectPath".to_string(),
        path_arg(options.project()),
        "-executeMethod".to_string(),
        BUILD_METHOD.to_string(),
        format!("--output-path={}", options.output_path()),
        format!("--platform={}", options.platform().editor_name()),
    ];

    if let Some(version) = options.version() {
        args.push(format!("--version={version}"));
    }
    if let Some(code) = options.version_code() {
        args.push(format!("--version-code={code}"));
    }

    args
}

/// Editor arguments for a test run.
pub fn test_arguments(options: &TestOptions) -> Vec<String> {
    let mut args = vec![
        "-batchmode".to_string(),
        "-runTests".to_string(),
        "-nographics".to_string(),
        "-projectPath".to_string(),
        path_arg(options.project()),
        "-testPlatform".to_string(),
        options.mode().editor_name().to_string(),
        "-testResults".to_string(),
        path_arg(options.results_path()),
    ];

    if let Some(coverage) = options.coverage() {
        args.push("-debugCodeOptimization".to_string());
        args.push("-enableCodeCoverage".to_string());
        if let Some(dir) = &coverage.results_location {
            args.push("-coverageResultsPath".to_string());
            args.push(path_arg(dir));
        }
        if let Some(dir) = &coverage.history_location {
            args.push("-coverageHistoryPath".to_string());
            args.push(path_arg(dir));
        }
        let names = coverage.option_names();
        if !names.is_empty() {
            args.push("-coverageOptions".to_string());
            args.push(names.join(";"));
        }
    }

    args
}

pub fn build_spawn_config(options: &BuildOptions) -> SpawnConfig {
    SpawnConfig {
        program: options.editor().to_path_buf(),
        args: build_arguments(options),
        work_dir: Some(options.project().to_path_buf()),
    }
}

pub fn test_spawn_config(options: &TestOptions) -> SpawnConfig {
    SpawnConfig {
        program: options.editor().to_path_buf(),
        args: test_arguments(options),
        work_dir: Some(options.project().to_path_buf()),
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}
