//! Service module - units, their runtime services and the manager.
//!
//! A [`Config`] of [`Unit`]s is turned into one [`Service`] per unit. Each
//! service dispatches Start/Stop to the execution strategy of its kind: the
//! ad-hoc path for `command` units and a [`Worker`] for `app` units. The
//! [`Manager`] drives all services in sequence order.

pub mod adhoc;
pub mod config;
pub mod manager;
pub mod process;
pub mod state;
pub mod unit;
pub mod worker;

#[cfg(test)]
mod manager_tests;

use crate::error::AppdError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info_span, Span};

// Re-exports for convenience
pub use config::Config;
pub use manager::Manager;
pub use state::{State, StateKind, Status, StatusKind};
pub use unit::{Unit, UnitKind};
pub use worker::{Worker, WorkerKind, WORKER_STOP_TIMEOUT};

/// Error recorded in a status and handed back to the caller.
pub type SharedError = Arc<AppdError>;

/// Serializable view of a service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSnapshot {
    /// 1-based position of the service.
    pub seq: usize,
    /// The unit the service runs.
    pub unit: Unit,
    /// Outcome of the last operation.
    pub status: Status,
    /// Current lifecycle phase.
    pub state: State,
    /// Execution strategy.
    pub kind: WorkerKind,
}

/// Runtime wrapper binding a unit to its status, state and worker.
///
/// After a Start or Stop the state is `completed`: it tracks the last
/// supervisory action, not whether the OS process is still alive.
#[derive(Debug)]
pub struct Service {
    seq: usize,
    unit: Unit,
    status: Status,
    state: State,
    kind: WorkerKind,
    worker: Option<Worker>,
    span: Span,
}

impl Service {
    /// Creates a pending service for `unit` at position `seq`.
    pub fn new(seq: usize, unit: Unit, parent: &Span) -> Self {
        let kind = WorkerKind::from(unit.kind);
        let span = info_span!(
            parent: parent,
            "service",
            service_name = %unit.name,
            kind = %unit.kind,
            seq_id = seq,
        );

        Self {
            seq,
            status: Status::new(&unit.name, StatusKind::Pending),
            state: State::new(&unit.name, StateKind::Pending),
            unit,
            kind,
            worker: None,
            span,
        }
    }

    /// Returns the 1-based position of the service.
    pub fn seq(&self) -> usize {
        self.seq
    }

    /// Returns the unit.
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    /// Returns the outcome of the last operation.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Returns the current lifecycle phase.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Returns the execution strategy.
    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    /// Returns the worker of a started app.
    pub fn worker(&self) -> Option<&Worker> {
        self.worker.as_ref()
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    /// Returns a serializable copy of the service.
    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            seq: self.seq,
            unit: self.unit.clone(),
            status: self.status.clone(),
            state: self.state.clone(),
            kind: self.kind,
        }
    }

    /// Runs a command to completion or spawns an app.
    pub async fn start(&mut self) -> Result<(), SharedError> {
        debug!(parent: &self.span, "starting service");

        let result = match self.kind {
            WorkerKind::Command => crate::service::adhoc::run(&self.unit, &self.span).await,
            WorkerKind::Application => {
                Worker::spawn(&self.unit, self.span.clone()).map(|worker| {
                    self.worker = Some(worker);
                })
            }
        };

        match result {
            Ok(()) => {
                self.state.current = StateKind::Completed;
                self.state.error = None;
                self.status.succeed();
                debug!(parent: &self.span, "started service");
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Stops an app; commands already ran to completion and are skipped.
    pub async fn stop(&mut self) -> Result<(), SharedError> {
        match self.kind {
            WorkerKind::Command => {
                debug!(parent: &self.span, reason = "command", "skipped stopping service");
                Ok(())
            }
            WorkerKind::Application => {
                let Some(worker) = self.worker.take() else {
                    debug!(parent: &self.span, reason = "not started", "skipped stopping service");
                    return Ok(());
                };

                debug!(parent: &self.span, pid = worker.pid(), "stopping service");
                let (state, status) = worker.stop().await;
                self.state = state;
                self.status = status;

                match &self.status.error {
                    Some(err) => {
                        debug!(parent: &self.span, error = %err, "failed stopping service");
                        Err(Arc::clone(err))
                    }
                    None => {
                        debug!(parent: &self.span, "stopped service");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Records a failed operation and returns the shared error.
    pub(crate) fn fail(&mut self, err: AppdError) -> SharedError {
        let err = Arc::new(err);
        self.state.current = StateKind::Completed;
        self.status.fail(Arc::clone(&err));
        err
    }
}
