//! Unit definitions.
//!
//! A unit describes one thing to supervise: a one-shot `command` that runs to
//! completion, or a long-running `app` that keeps running until stopped.

use crate::error::{AppdError, OutputPathError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

static ALIAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[a-zA-Z0-9_-]{3,100}$").expect("unit alias pattern is valid")
});

/// What kind of process a unit runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Runs to completion during start.
    Command,
    /// Keeps running until stopped.
    App,
}

impl UnitKind {
    /// Returns the configuration keyword of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Command => "command",
            UnitKind::App => "app",
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "command" => Ok(UnitKind::Command),
            "app" => Ok(UnitKind::App),
            _ => Err(format!("Invalid unit kind: {}", s)),
        }
    }
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

fn is_zero_u64(n: &u64) -> bool {
    *n == 0
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Configuration for a command or app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// 1-based position of the unit in its config, assigned when the config
    /// is finalized.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub seq: usize,

    /// The alias of the unit.
    pub name: String,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Command or app.
    pub kind: UnitKind,

    /// The executable to run.
    #[serde(rename = "cmd", default)]
    pub command: String,

    /// Arguments passed to the executable.
    #[serde(rename = "args", default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,

    /// The directory the process starts in.
    #[serde(rename = "workdir", default, skip_serializing_if = "Option::is_none")]
    pub work_directory: Option<PathBuf>,

    /// The higher the priority the sooner the unit should activate.
    /// Recorded but not used for ordering.
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub priority: u64,

    /// If set, the unit is neither started nor stopped.
    #[serde(default, skip_serializing_if = "is_false")]
    pub noop: bool,

    /// Units that should start after this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<String>,

    /// Units that should start before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,

    /// Standard output destination; inherited when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_out_file_path: Option<PathBuf>,

    /// Standard error destination; follows stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_err_file_path: Option<PathBuf>,
}

impl Unit {
    /// Creates a unit after validating its alias and kind.
    pub fn new(kind: &str, name: &str) -> Result<Self> {
        let name = name.trim();
        let kind = kind.trim();
        validate_alias(name)?;

        let kind = match kind {
            "" => {
                return Err(AppdError::EmptyKind {
                    unit: name.to_string(),
                })
            }
            other => other.parse().map_err(|_| AppdError::UnsupportedKind {
                unit: name.to_string(),
                kind: other.to_string(),
            })?,
        };

        Ok(Self {
            seq: 0,
            name: name.to_string(),
            description: None,
            kind,
            command: String::new(),
            arguments: Vec::new(),
            work_directory: None,
            priority: 0,
            noop: false,
            before: Vec::new(),
            after: Vec::new(),
            std_out_file_path: None,
            std_err_file_path: None,
        })
    }

    /// Validates a unit that was built without [`Unit::new`], e.g. deserialized.
    pub fn validate(&self) -> Result<()> {
        validate_alias(&self.name)
    }

    /// Pre-flight checks for the configured stdout/stderr targets.
    pub fn validate_output_paths(&self) -> Result<()> {
        for path in [&self.std_out_file_path, &self.std_err_file_path]
            .into_iter()
            .flatten()
        {
            validate_file_path(path).map_err(|reason| AppdError::InvalidOutputPath {
                path: path.clone(),
                reason,
            })?;
        }
        Ok(())
    }
}

/// Checks a unit alias against `^[A-Za-z0-9_-]{3,100}$`.
pub fn validate_alias(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AppdError::EmptyAlias);
    }
    if !ALIAS_RE.is_match(name) {
        return Err(AppdError::InvalidAlias {
            alias: name.to_string(),
        });
    }
    Ok(())
}

/// Checks that `path` can be used as an output file.
///
/// An existing file is fine, an existing directory is not. A missing file is
/// fine as long as its parent directory exists, since it is created on open.
pub fn validate_file_path(path: &Path) -> std::result::Result<(), OutputPathError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(OutputPathError::IsDirectory),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            match std::fs::metadata(parent) {
                Ok(_) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    Err(OutputPathError::ParentMissing(parent.to_path_buf()))
                }
                Err(e) => Err(OutputPathError::ParentUnreadable(parent.to_path_buf(), e)),
            }
        }
        Err(e) => Err(OutputPathError::Stat(e)),
    }
}
