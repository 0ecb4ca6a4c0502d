mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;

use cli::{Cli, Command};
use unity_ci::config::ProjectConfig;
use unity_ci::context::{BuildContext, RunSettings, TestContext};
use unity_ci::install::{self, InstallOutcome};
use unity_ci::log::RunLog;
use unity_ci::options::{BuildOptions, CoverageOptions, TestOptions};

fn config_source_label(config_path: Option<&Path>) -> String {
    config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults, no .unity-ci/config.toml found)".to_string())
}

fn push_kv(output: &mut String, key: &str, value: impl std::fmt::Display) {
    output.push_str(&format!("  {key:<22} {value}\n"));
}

fn path_or_none(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string())
}

fn render_config_human(config: &ProjectConfig, config_path: Option<&Path>) -> String {
    let mut output = String::new();
    output.push_str("Editor\n");
    push_kv(
        &mut output,
        "location",
        path_or_none(config.editor.location.as_deref()),
    );
    push_kv(
        &mut output,
        "log_path",
        config
            .editor
            .log_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(platform default)".to_string()),
    );
    output.push('\n');

    output.push_str("Build\n");
    push_kv(&mut output, "platform", config.build.platform);
    push_kv(
        &mut output,
        "output_path",
        config.build.output_path.as_deref().unwrap_or("(none)"),
    );
    push_kv(
        &mut output,
        "version",
        config.build.version.as_deref().unwrap_or("(none)"),
    );
    push_kv(
        &mut output,
        "version_code",
        config
            .build
            .version_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "(none)".to_string()),
    );
    push_kv(&mut output, "output_editor_log", config.build.output_editor_log);
    push_kv(
        &mut output,
        "force_script_install",
        config.build.force_script_install,
    );
    output.push('\n');

    output.push_str("Test\n");
    push_kv(&mut output, "mode", config.test.mode);
    push_kv(
        &mut output,
        "results_path",
        config
            .test
            .results_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(project)/test_results.xml".to_string()),
    );
    push_kv(&mut output, "output_editor_log", config.test.output_editor_log);
    match &config.test.coverage {
        Some(coverage) => {
            let names = coverage.option_names();
            push_kv(
                &mut output,
                "coverage",
                if names.is_empty() {
                    "enabled".to_string()
                } else {
                    names.join(";")
                },
            );
        }
        None => push_kv(&mut output, "coverage", "disabled"),
    }
    output.push('\n');

    output.push_str("Supervisor\n");
    push_kv(
        &mut output,
        "poll_interval",
        format!("{}ms", config.supervisor.poll_interval_millis),
    );
    push_kv(
        &mut output,
        "timeout",
        config
            .supervisor
            .timeout_secs
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "(none)".to_string()),
    );
    push_kv(
        &mut output,
        "fail_on_nonzero_exit",
        config.supervisor.fail_on_nonzero_exit,
    );
    output.push('\n');

    output.push_str("Classifier Rules\n");
    if config.classifier.rules.is_empty() {
        push_kv(&mut output, "entries", "(built-in only)");
    } else {
        for rule in &config.classifier.rules {
            output.push_str(&format!("  - {} => {}\n", rule.pattern, rule.severity.label()));
        }
    }
    output.push('\n');

    output.push_str("Source Path\n");
    push_kv(&mut output, "path", config_source_label(config_path));

    output
}

fn render_config_json(config: &ProjectConfig, config_path: Option<&Path>) -> Result<String> {
    let mut payload = serde_json::to_value(config).context("failed to serialize config")?;
    payload["source_path"] = serde_json::Value::String(config_source_label(config_path));
    serde_json::to_string_pretty(&payload).context("failed to serialize config to JSON")
}

fn run_settings(config: &ProjectConfig, run_log: Option<&Path>) -> Result<RunSettings> {
    let run_log = run_log.map(RunLog::open).transpose()?;
    Ok(RunSettings {
        rules: config.classification_rules()?,
        supervisor: config.supervisor.settings(),
        exit_policy: config.supervisor.exit_policy(),
        run_log,
    })
}

fn ensure_project_dir(project: &Path) -> Result<PathBuf> {
    if !project.is_dir() {
        anyhow::bail!("the Unity project folder '{}' does not exist", project.display());
    }
    Ok(project.to_path_buf())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let is_config_command = matches!(&cli.command, Command::Config { .. });

    // Echoed editor lines log on the `editor` target
    let filter = match cli.verbose {
        0 if is_config_command => "unity_ci=warn,editor=warn",
        0 => "unity_ci=info,editor=info",
        1 => "unity_ci=debug,editor=debug",
        _ => "unity_ci=trace,editor=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cwd = std::env::current_dir().context("failed to get current directory (was it deleted?)")?;
    let (config, config_path) = ProjectConfig::load(&cwd)?;

    if !is_config_command || cli.verbose > 0 {
        match config_path {
            Some(ref p) => info!("loaded config from {}", p.display()),
            None => info!("no .unity-ci/config.toml found, using defaults"),
        }
    }

    match cli.command {
        Command::Build {
            project,
            platform,
            output_path,
            version,
            version_code,
            editor,
            quiet_log,
            force_script_install,
        } => {
            let mut request = config.build_request(&project);
            if let Some(platform) = platform {
                request.platform = platform.into();
            }
            if output_path.is_some() {
                request.output_path = output_path;
            }
            if version.is_some() {
                request.version = version;
            }
            if version_code.is_some() {
                request.version_code = version_code;
            }
            if editor.is_some() {
                request.editor = editor;
            }
            if quiet_log {
                request.output_editor_log = false;
            }
            request.force_script_install |= force_script_install;

            let options = BuildOptions::validate(request).context("invalid build options")?;
            let context = BuildContext::new(options, run_settings(&config, cli.run_log.as_deref())?);
            context.dump_options();
            context.build().context("Unity build failed")?;
        }

        Command::Test {
            project,
            mode,
            results,
            editor,
            quiet_log,
            coverage,
        } => {
            let mut request = config.test_request(&project);
            if let Some(mode) = mode {
                request.mode = mode.into();
            }
            if results.is_some() {
                request.results_path = results;
            }
            if editor.is_some() {
                request.editor = editor;
            }
            if quiet_log {
                request.output_editor_log = false;
            }
            if coverage && request.coverage.is_none() {
                request.coverage = Some(CoverageOptions::default());
            }

            let options = TestOptions::validate(request).context("invalid test options")?;
            let context = TestContext::new(options, run_settings(&config, cli.run_log.as_deref())?);
            context.dump_options();
            let summary = context.test().context("Unity tests failed")?;
            info!(%summary, "all tests passed");
        }

        Command::InstallScript { project } => {
            let project = ensure_project_dir(&project)?;
            match install::install_script(&project)? {
                InstallOutcome::Unchanged => {
                    println!("Build script already up to date in {}", project.display())
                }
                _ => println!(
                    "Installed build script to {}",
                    install::script_path(&project).display()
                ),
            }
        }

        Command::Config { json } => {
            if json {
                println!("{}", render_config_json(&config, config_path.as_deref())?);
            } else {
                print!("{}", render_config_human(&config, config_path.as_deref()));
            }
        }
    }

    Ok(())
}
