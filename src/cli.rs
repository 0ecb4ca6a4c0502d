use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use unity_ci::options::{BuildPlatform, TestMode};

#[derive(Parser, Debug)]
#[command(
    name = "unity-ci",
    about = "Drive headless Unity editor builds and test runs from CI",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Append a JSON lines record of the run to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub run_log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a player for a Unity project
    Build {
        /// Path to the Unity project folder
        project: PathBuf,

        /// Target platform
        #[arg(long, value_enum)]
        platform: Option<PlatformArg>,

        /// Where the bridging script writes the player (no spaces)
        #[arg(long)]
        output_path: Option<String>,

        /// Player version string
        #[arg(long)]
        version: Option<String>,

        /// Android bundle version code (0-100000)
        #[arg(long)]
        version_code: Option<u32>,

        /// Path to the Unity editor executable
        #[arg(long)]
        editor: Option<PathBuf>,

        /// Only surface errors from the editor log
        #[arg(long)]
        quiet_log: bool,

        /// Reinstall the bridging script even if present
        #[arg(long)]
        force_script_install: bool,
    },

    /// Run edit-mode or play-mode tests for a Unity project
    Test {
        /// Path to the Unity project folder
        project: PathBuf,

        /// Test runner to use
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Where the editor writes the NUnit results file
        #[arg(long)]
        results: Option<PathBuf>,

        /// Path to the Unity editor executable
        #[arg(long)]
        editor: Option<PathBuf>,

        /// Only surface errors from the editor log
        #[arg(long)]
        quiet_log: bool,

        /// Enable code coverage with the configured (or default) options
        #[arg(long)]
        coverage: bool,
    },

    /// Install the bridging build script into a Unity project
    InstallScript {
        /// Path to the Unity project folder
        project: PathBuf,
    },

    /// Show effective configuration
    Config {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformArg {
    StandaloneWindows64,
    StandaloneWindows,
    #[value(name = "webgl")]
    WebGL,
    Android,
    #[value(name = "ios")]
    IOS,
}

impl From<PlatformArg> for BuildPlatform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::StandaloneWindows64 => BuildPlatform::StandaloneWindows64,
            PlatformArg::StandaloneWindows => BuildPlatform::StandaloneWindows,
            PlatformArg::WebGL => BuildPlatform::WebGL,
            PlatformArg::Android => BuildPlatform::Android,
            PlatformArg::IOS => BuildPlatform::IOS,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    EditMode,
    PlayMode,
}

impl From<ModeArg> for TestMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::EditMode => TestMode::EditMode,
            ModeArg::PlayMode => TestMode::PlayMode,
        }
    }
}
