//! Installs the bridging build script into a Unity project.
//!
//! The editor can only build a player from C# running inside the project, so
//! builds call a static method in `Assets/UnityCi/Editor/AutomatedBuild.cs`.
//! The script ships inside this binary.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

const AUTOMATED_BUILD_SCRIPT: &str = include_str!("../assets/AutomatedBuild.cs");

/// Location of the script relative to the project folder.
pub fn script_relative_path() -> PathBuf {
    Path::new("Assets")
        .join("UnityCi")
        .join("Editor")
        .join("AutomatedBuild.cs")
}

pub fn script_path(project: &Path) -> PathBuf {
    project.join(script_relative_path())
}

pub fn has_script(project: &Path) -> bool {
    script_path(project).is_file()
}

/// What an install did to the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    CreatedOrUpdated,
    Unchanged,
    /// The script was already present and no reinstall was requested.
    Skipped,
}

/// Install the script when it is missing, or always when `force` is set.
pub fn ensure_script(project: &Path, force: bool) -> Result<InstallOutcome> {
    if has_script(project) && !force {
        return Ok(InstallOutcome::Skipped);
    }
    install_script(project)
}

/// Write the embedded script, leaving an identical file untouched.
pub fn install_script(project: &Path) -> Result<InstallOutcome> {
    let path = script_path(project);
    let io_err = |source| Error::ScriptInstall {
        path: path.clone(),
        source,
    };

    info!("Installing AutomatedBuild script...");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let should_write = match fs::read_to_string(&path) {
        Ok(existing) => existing != AUTOMATED_BUILD_SCRIPT,
        Err(err) if err.kind() == ErrorKind::NotFound => true,
        // Unreadable or not UTF-8: overwrite it
        Err(_) => true,
    };

    if !should_write {
        info!(path = %path.display(), "AutomatedBuild script already up to date");
        return Ok(InstallOutcome::Unchanged);
    }

    fs::write(&path, AUTOMATED_BUILD_SCRIPT).map_err(io_err)?;
    info!("AutomatedBuild script installed to \"{}\"", path.display());
    Ok(InstallOutcome::CreatedOrUpdated)
}
