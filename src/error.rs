//! Error types and error handling for appd.
//!
//! This module defines the single error type used throughout the supervisor,
//! grouped by the stage that raises it (configuration, provisioning, spawn,
//! termination), together with the CLI exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// CLI exit codes.
pub mod exit_code {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// General error
    pub const GENERAL_ERROR: i32 = 1;
    /// Configuration error
    pub const CONFIG_ERROR: i32 = 2;
    /// One of the units failed to start
    pub const START_ERROR: i32 = 3;
    /// Command line argument error
    pub const CLI_ERROR: i32 = 64;
}

/// The ordering list a unit name was referenced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingList {
    /// The `before` list.
    Before,
    /// The `after` list.
    After,
}

impl fmt::Display for OrderingList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingList::Before => write!(f, "before"),
            OrderingList::After => write!(f, "after"),
        }
    }
}

/// Why a configured output path was rejected before spawning.
#[derive(Debug, Error)]
pub enum OutputPathError {
    /// The path points at a directory.
    #[error("file path is directory")]
    IsDirectory,

    /// Neither the file nor its parent directory exist.
    #[error("parent directory does not exist: {}", .0.display())]
    ParentMissing(PathBuf),

    /// Looking up the parent directory failed for another reason.
    #[error("parent directory erred: {}", .0.display())]
    ParentUnreadable(PathBuf, #[source] std::io::Error),

    /// Looking up the file failed for another reason.
    #[error(transparent)]
    Stat(std::io::Error),
}

/// The main error type for appd.
#[derive(Debug, Error)]
pub enum AppdError {
    /// A unit was declared without an alias.
    #[error("empty unit alias")]
    EmptyAlias,

    /// A unit alias does not match `^[A-Za-z0-9_-]{3,100}$`.
    #[error("invalid unit alias: {alias:?}")]
    InvalidAlias { alias: String },

    /// A unit was declared without a kind.
    #[error("unit {unit:?}: empty type")]
    EmptyKind { unit: String },

    /// A unit kind other than `command` or `app`.
    #[error("unit {unit:?}: invalid {kind:?} type")]
    UnsupportedKind { unit: String, kind: String },

    /// Two units share the same name.
    #[error("unit {name:?} already exists")]
    DuplicateUnit { name: String },

    /// A `before`/`after` entry names a unit that is not configured.
    #[error("unit {unit:?}: {list} references unknown unit {missing:?}")]
    DanglingReference {
        unit: String,
        list: OrderingList,
        missing: String,
    },

    /// A directive received fewer arguments than it requires.
    #[error("too few args for {directive:?} directive")]
    TooFewArgs { directive: String },

    /// A directive received more arguments than it accepts.
    #[error("too many args for {directive:?} directive")]
    TooManyArgs { directive: String },

    /// A unit declaration used an unknown key.
    #[error("unsupported {key:?} key")]
    UnsupportedKey { key: String },

    /// A directive argument could not be parsed.
    #[error("invalid value {value:?} for {directive:?} directive")]
    InvalidValue { directive: String, value: String },

    /// Configuration file is invalid or cannot be loaded.
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Start or Stop was requested from a manager that was never provisioned.
    #[error("provisioning has failed")]
    NotProvisioned,

    /// Start was requested while the services are already started.
    #[error("services are already started")]
    AlreadyStarted,

    /// A stdout/stderr target failed the pre-flight check.
    #[error("invalid output path {}: {reason}", .path.display())]
    InvalidOutputPath {
        path: PathBuf,
        #[source]
        reason: OutputPathError,
    },

    /// Opening a stdout/stderr target failed.
    #[error("failed opening output file {}: {source}", .path.display())]
    IoOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process could not be created.
    #[error("failed to spawn {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A one-shot command ran but did not exit successfully.
    #[error("command {command:?} failed: {status}")]
    Exit { command: String, status: ExitStatus },

    /// The manager stopped its start pass at a failing unit.
    #[error("service manager failed to start services: {service} failed")]
    StartFailed { service: String },

    /// The worker holds no live process handle.
    #[error("worker has no running process")]
    MissingProcess,

    /// Delivering the interrupt signal failed.
    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    /// Waiting for the process to exit failed.
    #[error("failed waiting for process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    /// The process exited after being asked to stop.
    #[error("process exited: {status}")]
    ProcessExited { status: ExitStatus },

    /// The forced kill after the stop timeout failed.
    #[error("force terminated failed: {source}")]
    KillFailed {
        #[source]
        source: nix::errno::Errno,
    },

    /// The process ignored the interrupt and was killed.
    #[error("force terminated process")]
    ForceTerminated,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppdError {
    /// Returns true for errors raised while building or validating configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            AppdError::EmptyAlias
                | AppdError::InvalidAlias { .. }
                | AppdError::EmptyKind { .. }
                | AppdError::UnsupportedKind { .. }
                | AppdError::DuplicateUnit { .. }
                | AppdError::DanglingReference { .. }
                | AppdError::TooFewArgs { .. }
                | AppdError::TooManyArgs { .. }
                | AppdError::UnsupportedKey { .. }
                | AppdError::InvalidValue { .. }
                | AppdError::Config { .. }
                | AppdError::Yaml(_)
        )
    }

    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_config_error() {
            return exit_code::CONFIG_ERROR;
        }
        match self {
            AppdError::NotProvisioned
            | AppdError::StartFailed { .. }
            | AppdError::InvalidOutputPath { .. }
            | AppdError::IoOpen { .. }
            | AppdError::Spawn { .. }
            | AppdError::Exit { .. } => exit_code::START_ERROR,
            _ => exit_code::GENERAL_ERROR,
        }
    }

    /// Creates a configuration error with a message.
    pub fn config(message: impl Into<String>) -> Self {
        AppdError::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a configuration error with a message and source.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppdError::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias for appd operations.
pub type Result<T> = std::result::Result<T, AppdError>;
