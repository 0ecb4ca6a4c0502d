use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::{ClassificationRules, Severity};
use crate::context::ExitPolicy;
use crate::options::{BuildPlatform, BuildRequest, CoverageOptions, TestMode, TestRequest};
use crate::supervisor::SupervisorSettings;

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".unity-ci";

/// Where the editor lives and where it logs.
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq)]
pub struct EditorConfig {
    #[serde(default)]
    pub location: Option<PathBuf>,
    /// Overrides the per-OS `Editor.log` location.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_millis() -> u64 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BuildConfig {
    #[serde(default)]
    pub platform: BuildPlatform,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub version_code: Option<u32>,
    #[serde(default = "default_true")]
    pub output_editor_log: bool,
    #[serde(default)]
    pub force_script_install: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            platform: BuildPlatform::default(),
            output_path: None,
            version: None,
            version_code: None,
            output_editor_log: default_true(),
            force_script_install: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TestConfig {
    #[serde(default)]
    pub mode: TestMode,
    #[serde(default)]
    pub results_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub output_editor_log: bool,
    /// Present means coverage is enabled.
    ///
    /// ```toml
    /// [test.coverage]
    /// results-location = "CodeCoverage"
    /// generate-html-report = true
    /// ```
    #[serde(default)]
    pub coverage: Option<CoverageOptions>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            mode: TestMode::default(),
            results_path: None,
            output_editor_log: default_true(),
            coverage: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SupervisorConfig {
    #[serde(default = "default_poll_interval_millis")]
    pub poll_interval_millis: u64,
    /// Kill the editor after this many seconds. Unset waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub fail_on_nonzero_exit: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_millis: default_poll_interval_millis(),
            timeout_secs: None,
            fail_on_nonzero_exit: false,
        }
    }
}

impl SupervisorConfig {
    pub fn settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            poll_interval: Duration::from_millis(self.poll_interval_millis.max(1)),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn exit_policy(&self) -> ExitPolicy {
        ExitPolicy {
            fail_on_nonzero_exit: self.fail_on_nonzero_exit,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RuleConfig {
    pub pattern: String,
    pub severity: Severity,
}

/// Extra classification rules, checked before the built-in ones in file order.
///
/// ```toml
/// [[classifier.rules]]
/// pattern = "Shader error in"
/// severity = "error"
/// ```
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProjectConfig {
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl ProjectConfig {
    /// Search upward from `start` for a `.unity-ci/config.toml` file and load it.
    /// Returns the default config if no file is found.
    pub fn load(start: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = Self::find_config_file(start) {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: ProjectConfig = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok((config, Some(path)))
        } else {
            Ok((ProjectConfig::default(), None))
        }
    }

    fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Configured rules above the built-in editor rules.
    pub fn classification_rules(&self) -> Result<ClassificationRules> {
        ClassificationRules::unity_editor()
            .with_priority_rules(
                self.classifier
                    .rules
                    .iter()
                    .map(|r| (r.pattern.as_str(), r.severity)),
            )
            .context("invalid [[classifier.rules]] pattern")
    }

    /// Build settings from config, before CLI overrides.
    pub fn build_request(&self, project: &Path) -> BuildRequest {
        BuildRequest {
            platform: self.build.platform,
            output_path: self.build.output_path.clone(),
            version: self.build.version.clone(),
            version_code: self.build.version_code,
            editor: self.editor.location.clone(),
            editor_log: self.editor.log_path.clone(),
            output_editor_log: self.build.output_editor_log,
            force_script_install: self.build.force_script_install,
            ..BuildRequest::new(project)
        }
    }

    /// Test settings from config, before CLI overrides.
    pub fn test_request(&self, project: &Path) -> TestRequest {
        TestRequest {
            mode: self.test.mode,
            results_path: self.test.results_path.clone(),
            editor: self.editor.location.clone(),
            editor_log: self.editor.log_path.clone(),
            output_editor_log: self.test.output_editor_log,
            coverage: self.test.coverage.clone(),
            ..TestRequest::new(project)
        }
    }
}
