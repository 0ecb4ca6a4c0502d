//! Options for one build or test invocation.
//!
//! A `*Request` is the loose, mergeable form filled from config and CLI
//! flags. Validation turns it into immutable `BuildOptions`/`TestOptions`,
//! failing fast before anything is launched.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::editor;
use crate::error::{Error, Result};

/// Highest Android version code the bridging script accepts.
pub const MAX_VERSION_CODE: u32 = 100_000;

/// Player build targets supported by the bridging script.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildPlatform {
    #[default]
    StandaloneWindows64,
    StandaloneWindows,
    #[serde(rename = "webgl")]
    WebGL,
    Android,
    #[serde(rename = "ios")]
    IOS,
}

impl BuildPlatform {
    /// Name as understood by the bridging script (`BuildTarget` in the editor).
    pub fn editor_name(self) -> &'static str {
        match self {
            BuildPlatform::StandaloneWindows64 => "StandaloneWindows64",
            BuildPlatform::StandaloneWindows => "StandaloneWindows",
            BuildPlatform::WebGL => "WebGL",
            BuildPlatform::Android => "Android",
            BuildPlatform::IOS => "iOS",
        }
    }
}

impl fmt::Display for BuildPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.editor_name())
    }
}

/// Which test runner the editor should use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestMode {
    #[default]
    EditMode,
    PlayMode,
}

impl TestMode {
    /// Value for `-testPlatform`.
    pub fn editor_name(self) -> &'static str {
        match self {
            TestMode::EditMode => "editmode",
            TestMode::PlayMode => "playmode",
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestMode::EditMode => f.write_str("EditMode"),
            TestMode::PlayMode => f.write_str("PlayMode"),
        }
    }
}

/// Code coverage settings for a test run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CoverageOptions {
    /// Where coverage results and report go. Defaults to the project folder.
    pub results_location: Option<PathBuf>,
    /// Where report history goes. Defaults to the project folder.
    pub history_location: Option<PathBuf>,
    pub generate_html_report: bool,
    pub generate_html_report_history: bool,
    pub generate_additional_metrics: bool,
    pub generate_badge_report: bool,
    pub generate_additional_reports: bool,
    pub generate_test_references: bool,
    pub use_project_settings: bool,
}

impl CoverageOptions {
    /// The `-coverageOptions` entries for every enabled flag.
    pub fn option_names(&self) -> Vec<&'static str> {
        let flags = [
            (self.generate_html_report, "generateHtmlReport"),
            (self.generate_html_report_history, "generateHtmlReportHistory"),
            (self.generate_additional_metrics, "generateAdditionalMetrics"),
            (self.generate_badge_report, "generateBadgeReport"),
            (self.generate_additional_reports, "generateAdditionalReports"),
            (self.generate_test_references, "generateTestReferences"),
            (self.use_project_settings, "useProjectSettings"),
        ];
        flags
            .into_iter()
            .filter_map(|(on, name)| on.then_some(name))
            .collect()
    }
}

/// Unvalidated build settings.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub project: PathBuf,
    pub platform: BuildPlatform,
    pub output_path: Option<String>,
    pub version: Option<String>,
    pub version_code: Option<u32>,
    pub editor: Option<PathBuf>,
    pub editor_log: Option<PathBuf>,
    pub output_editor_log: bool,
    pub force_script_install: bool,
}

impl BuildRequest {
    pub fn new(project: &Path) -> Self {
        Self {
            project: project.to_path_buf(),
            platform: BuildPlatform::default(),
            output_path: None,
            version: None,
            version_code: None,
            editor: None,
            editor_log: None,
            output_editor_log: true,
            force_script_install: false,
        }
    }
}

/// Validated, immutable build options.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    project: PathBuf,
    platform: BuildPlatform,
    output_path: String,
    version: Option<String>,
    version_code: Option<u32>,
    editor: PathBuf,
    editor_log: PathBuf,
    output_editor_log: bool,
    force_script_install: bool,
}

impl BuildOptions {
    pub fn validate(request: BuildRequest) -> Result<Self> {
        let output_path = match request.output_path {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Err(Error::MissingOutputPath),
        };
        reject_whitespace("output path", &output_path)?;

        if let Some(version) = &request.version {
            reject_whitespace("build version", version)?;
        }
        if let Some(code) = request.version_code {
            if code > MAX_VERSION_CODE {
                return Err(Error::VersionCodeOutOfRange(code));
            }
        }

        let (project, editor, editor_log) =
            validate_common(&request.project, request.editor, request.editor_log)?;

        Ok(Self {
            project,
            platform: request.platform,
            output_path,
            version: request.version.filter(|v| !v.is_empty()),
            version_code: request.version_code,
            editor,
            editor_log,
            output_editor_log: request.output_editor_log,
            force_script_install: request.force_script_install,
        })
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn platform(&self) -> BuildPlatform {
        self.platform
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn version_code(&self) -> Option<u32> {
        self.version_code
    }

    pub fn editor(&self) -> &Path {
        &self.editor
    }

    pub fn editor_log(&self) -> &Path {
        &self.editor_log
    }

    pub fn output_editor_log(&self) -> bool {
        self.output_editor_log
    }

    pub fn force_script_install(&self) -> bool {
        self.force_script_install
    }

    /// Every option, one `name: value` line each.
    pub fn dump(&self) -> Vec<String> {
        vec![
            format!("ProjectPath: {}", self.project.display()),
            format!("Platform: {}", self.platform),
            format!("OutputPath: \"{}\"", self.output_path),
            format!("BuildVersion: {}", self.version.as_deref().unwrap_or("")),
            format!(
                "BuildVersionCode: {}",
                self.version_code.map(|c| c.to_string()).unwrap_or_default()
            ),
            format!("UnityEditorLocation: {}", self.editor.display()),
            format!("EditorLog: {}", self.editor_log.display()),
            format!("OutputEditorLog: {}", self.output_editor_log),
            format!("ForceScriptInstall: {}", self.force_script_install),
        ]
    }
}

/// Unvalidated test settings.
#[derive(Debug, Clone)]
pub struct TestRequest {
    pub project: PathBuf,
    pub mode: TestMode,
    pub results_path: Option<PathBuf>,
    pub editor: Option<PathBuf>,
    pub editor_log: Option<PathBuf>,
    pub output_editor_log: bool,
    pub coverage: Option<CoverageOptions>,
}

impl TestRequest {
    pub fn new(project: &Path) -> Self {
        Self {
            project: project.to_path_buf(),
            mode: TestMode::default(),
            results_path: None,
            editor: None,
            editor_log: None,
            output_editor_log: true,
            coverage: None,
        }
    }
}

/// Validated, immutable test options.
#[derive(Debug, Clone)]
pub struct TestOptions {
    project: PathBuf,
    mode: TestMode,
    results_path: PathBuf,
    editor: PathBuf,
    editor_log: PathBuf,
    output_editor_log: bool,
    coverage: Option<CoverageOptions>,
}

impl TestOptions {
    pub fn validate(request: TestRequest) -> Result<Self> {
        let (project, editor, editor_log) =
            validate_common(&request.project, request.editor, request.editor_log)?;

        let results_path = match request.results_path {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => project.join("test_results.xml"),
        };

        Ok(Self {
            project,
            mode: request.mode,
            results_path,
            editor,
            editor_log,
            output_editor_log: request.output_editor_log,
            coverage: request.coverage,
        })
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn mode(&self) -> TestMode {
        self.mode
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn editor(&self) -> &Path {
        &self.editor
    }

    pub fn editor_log(&self) -> &Path {
        &self.editor_log
    }

    pub fn output_editor_log(&self) -> bool {
        self.output_editor_log
    }

    pub fn coverage(&self) -> Option<&CoverageOptions> {
        self.coverage.as_ref()
    }

    pub fn dump(&self) -> Vec<String> {
        vec![
            format!("ProjectPath: {}", self.project.display()),
            format!("TestMode: {}", self.mode),
            format!("TestResultOutputPath: {}", self.results_path.display()),
            format!("UnityEditorLocation: {}", self.editor.display()),
            format!("EditorLog: {}", self.editor_log.display()),
            format!("OutputEditorLog: {}", self.output_editor_log),
            format!("EnableCodeCoverage: {}", self.coverage.is_some()),
        ]
    }
}

fn reject_whitespace(option: &'static str, value: &str) -> Result<()> {
    if value.chars().any(char::is_whitespace) {
        return Err(Error::ContainsWhitespace {
            option,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_common(
    project: &Path,
    editor: Option<PathBuf>,
    editor_log: Option<PathBuf>,
) -> Result<(PathBuf, PathBuf, PathBuf)> {
    let editor = editor.ok_or(Error::EditorNotSet)?;
    if !editor.is_file() {
        return Err(Error::EditorNotFound(editor));
    }
    if !project.is_dir() {
        return Err(Error::ProjectNotFound(project.to_path_buf()));
    }
    let editor_log = match editor_log {
        Some(path) => path,
        None => editor::default_log_location()?,
    };
    Ok((project.to_path_buf(), editor, editor_log))
}
