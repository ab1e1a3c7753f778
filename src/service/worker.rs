//! Worker owning a long-running app process.
//!
//! The worker spawns the process with its streams redirected and remembers
//! its pid. Stopping follows the graceful termination protocol: send
//! `SIGINT`, wait for the process to exit, and kill it with `SIGKILL` if it
//! is still around after [`WORKER_STOP_TIMEOUT`].

use crate::error::{AppdError, Result};
use crate::service::process::build_command;
use crate::service::state::{State, StateKind, Status, StatusKind};
use crate::service::unit::{Unit, UnitKind};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{debug, warn, Span};

/// How long a stopping process gets between `SIGINT` and `SIGKILL`.
pub const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(4);

/// Execution strategy of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    /// Run once to completion.
    Command,
    /// Spawn and keep a handle until stopped.
    Application,
}

impl From<UnitKind> for WorkerKind {
    fn from(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Command => WorkerKind::Command,
            UnitKind::App => WorkerKind::Application,
        }
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerKind::Command => write!(f, "command"),
            WorkerKind::Application => write!(f, "application"),
        }
    }
}

/// The error a stop reports once the process exited after `SIGINT`.
///
/// Stopping an app never yields a success status: a process that honored the
/// interrupt is reported as a failure carrying its exit status, and callers
/// treat it as informational.
fn exit_outcome(result: io::Result<ExitStatus>) -> AppdError {
    match result {
        Ok(status) => AppdError::ProcessExited { status },
        Err(source) => AppdError::Wait { source },
    }
}

/// Live handle to a spawned app process.
#[derive(Debug)]
pub struct Worker {
    name: String,
    pid: u32,
    child: Mutex<Option<Child>>,
    span: Span,
}

impl Worker {
    /// Spawns the unit's process.
    pub fn spawn(unit: &Unit, span: Span) -> Result<Self> {
        let mut cmd = build_command(unit)?;
        let child = cmd.spawn().map_err(|source| AppdError::Spawn {
            command: unit.command.clone(),
            source,
        })?;

        let pid = child.id().ok_or(AppdError::MissingProcess)?;
        debug!(parent: &span, pid, command = %unit.command, "spawned process");

        Ok(Self {
            name: unit.name.clone(),
            pid,
            child: Mutex::new(Some(child)),
            span,
        })
    }

    /// Returns the pid of the spawned process.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Stops the process with [`WORKER_STOP_TIMEOUT`] as grace period.
    pub async fn stop(&self) -> (State, Status) {
        self.stop_with_timeout(WORKER_STOP_TIMEOUT).await
    }

    /// Interrupts the process and waits up to `grace` for it to exit before
    /// killing it.
    ///
    /// The state is always `completed`; the status is always `failure`, its
    /// error telling how the process went away.
    pub(crate) async fn stop_with_timeout(&self, grace: Duration) -> (State, Status) {
        let mut guard = self.child.lock().await;
        let error = match guard.take() {
            Some(child) => self.terminate(child, grace).await,
            None => AppdError::MissingProcess,
        };

        let state = State::new(&self.name, StateKind::Completed);
        let mut status = Status::new(&self.name, StatusKind::Unknown);
        status.fail(Arc::new(error));
        (state, status)
    }

    async fn terminate(&self, mut child: Child, grace: Duration) -> AppdError {
        let pid = match i32::try_from(self.pid) {
            Ok(raw) if raw > 0 => Pid::from_raw(raw),
            _ => return AppdError::MissingProcess,
        };

        // The waiter reaps the child even when the timeout wins.
        let mut exited = tokio::spawn(async move { child.wait().await });

        if let Err(source) = signal::kill(pid, Signal::SIGINT) {
            warn!(parent: &self.span, pid = self.pid, error = %source, "failed to interrupt process");
            return AppdError::Signal {
                pid: self.pid,
                source,
            };
        }
        debug!(parent: &self.span, pid = self.pid, "sent interrupt signal");

        tokio::select! {
            joined = &mut exited => {
                let result = joined.unwrap_or_else(|e| Err(io::Error::other(e)));
                debug!(parent: &self.span, pid = self.pid, "process exited after interrupt");
                exit_outcome(result)
            }
            _ = tokio::time::sleep(grace) => {
                warn!(parent: &self.span, pid = self.pid, "process ignored interrupt, killing");
                match signal::kill(pid, Signal::SIGKILL) {
                    Ok(()) => AppdError::ForceTerminated,
                    Err(source) => AppdError::KillFailed { source },
                }
            }
        }
    }
}
