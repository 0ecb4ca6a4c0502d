//! Severity classification for Unity editor log lines.
//!
//! The editor never reports success or failure to its caller directly, so
//! every line of `Editor.log` is run through an ordered list of regex rules.
//! The first rule that matches decides the line's severity; lines no rule
//! recognises are `Debug` noise.
//!
//! ## Rule order
//!
//! Rules are evaluated top to bottom and order is significant. Narrow failure
//! markers sit above the broad warning patterns so a line such as
//! `WARNING: Build Failed` is still an error.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// How important a single editor log line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Useful for diagnostics only.
    Debug,
    /// Progress worth surfacing.
    Info,
    /// Something looks wrong but the run can continue.
    Warning,
    /// The editor reported a failure. Any error fails the invocation.
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Ordered `(pattern, severity)` rules. First match wins.
#[derive(Debug, Clone)]
pub struct ClassificationRules {
    rules: Vec<(Regex, Severity)>,
}

fn rule(pattern: &str) -> Regex {
    compile(pattern).expect("built-in classification pattern is valid")
}

impl ClassificationRules {
    /// An empty rule list. Every line classifies as `Debug`.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Built-in rules for the Unity editor log and the bridging build script.
    pub fn unity_editor() -> Self {
        Self {
            rules: vec![
                // Explicit failure marker written by the build pipeline
                (rule(r"build failed"), Severity::Error),
                // Compiler errors: "Assets/Foo.cs(12,5): error CS0103: ..."
                (rule(r"\berror CS\d{4}\b"), Severity::Error),
                (rule(r"scripts have compiler errors"), Severity::Error),
                (rule(r"aborting batchmode due to failure"), Severity::Error),
                (rule(r"^\[unity-ci\]\s*error\b"), Severity::Error),
                (rule(r"^warning"), Severity::Warning),
                (rule(r"\bwarning CS\d{4}\b"), Severity::Warning),
                (rule(r"^\[unity-ci\]"), Severity::Info),
                (rule(r"^build succeeded"), Severity::Info),
            ],
        }
    }

    /// Append a rule below every existing rule.
    pub fn push(&mut self, pattern: &str, severity: Severity) -> Result<()> {
        let regex = compile(pattern)?;
        self.rules.push((regex, severity));
        Ok(())
    }

    /// Insert a rule above every existing rule.
    pub fn push_front(&mut self, pattern: &str, severity: Severity) -> Result<()> {
        let regex = compile(pattern)?;
        self.rules.insert(0, (regex, severity));
        Ok(())
    }

    /// Prepend a batch of rules, keeping their relative order.
    pub fn with_priority_rules<'a, I>(mut self, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, Severity)>,
    {
        let mut compiled = Vec::new();
        for (pattern, severity) in extra {
            compiled.push((compile(pattern)?, severity));
        }
        compiled.append(&mut self.rules);
        self.rules = compiled;
        Ok(self)
    }

    /// Classify one line. Pure and deterministic.
    pub fn classify(&self, line: &str) -> Severity {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(line))
            .map(|(_, severity)| *severity)
            .unwrap_or(Severity::Debug)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ClassificationRules {
    fn default() -> Self {
        Self::unity_editor()
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("invalid classification pattern: {pattern}"))
}
