//! Lifecycle state and operation status of a service.
//!
//! `State` records which lifecycle phase a service is in; `Status` records
//! how the most recent Start or Stop call went. Both carry the service name
//! so they can be reported on their own.

use crate::error::AppdError;
use serde::{Serialize, Serializer};
use std::sync::Arc;

/// Lifecycle phase of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// Not yet known.
    #[default]
    Unknown,
    /// Waiting for the first supervisory action.
    Pending,
    /// Running.
    Running,
    /// Stopped.
    Stopped,
    /// Paused.
    Paused,
    /// The last supervisory action finished.
    Completed,
}

impl StateKind {
    /// Returns the lower-cased name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Unknown => "unknown",
            StateKind::Pending => "pending",
            StateKind::Running => "running",
            StateKind::Stopped => "stopped",
            StateKind::Paused => "paused",
            StateKind::Completed => "completed",
        }
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the last lifecycle operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Not yet known.
    #[default]
    Unknown,
    /// No operation has run yet.
    Pending,
    /// The operation succeeded.
    Success,
    /// The operation failed.
    Failure,
}

impl StatusKind {
    /// Returns the lower-cased name of the outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Unknown => "unknown",
            StatusKind::Pending => "pending",
            StatusKind::Success => "success",
            StatusKind::Failure => "failure",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn serialize_error<S>(error: &Option<Arc<AppdError>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(err) => serializer.serialize_str(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// The last recorded lifecycle phase of a service.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    /// Current phase.
    pub current: StateKind,
    /// The service this state belongs to.
    pub service_name: String,
    /// Error attached to the phase, if any.
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Arc<AppdError>>,
}

impl State {
    /// Creates a state for the named service.
    pub fn new(service_name: impl Into<String>, current: StateKind) -> Self {
        Self {
            current,
            service_name: service_name.into(),
            error: None,
        }
    }
}

/// Outcome of the most recent Start or Stop call.
///
/// `error` is set exactly when `current` is [`StatusKind::Failure`].
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    /// Current outcome.
    pub current: StatusKind,
    /// The service this status belongs to.
    pub service_name: String,
    /// Why the operation failed.
    #[serde(
        serialize_with = "serialize_error",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<Arc<AppdError>>,
}

impl Status {
    /// Creates a status for the named service.
    pub fn new(service_name: impl Into<String>, current: StatusKind) -> Self {
        Self {
            current,
            service_name: service_name.into(),
            error: None,
        }
    }

    /// Creates a failed status carrying `error`.
    pub fn failure(service_name: impl Into<String>, error: AppdError) -> Self {
        Self {
            current: StatusKind::Failure,
            service_name: service_name.into(),
            error: Some(Arc::new(error)),
        }
    }

    /// Marks the status as successful and clears any previous error.
    pub fn succeed(&mut self) {
        self.current = StatusKind::Success;
        self.error = None;
    }

    /// Marks the status as failed with `error`.
    pub fn fail(&mut self, error: Arc<AppdError>) {
        self.current = StatusKind::Failure;
        self.error = Some(error);
    }

    /// Returns true if the last operation failed.
    pub fn is_failure(&self) -> bool {
        self.current == StatusKind::Failure
    }
}
