//! Manager orchestrating start and stop across all services.

use crate::error::{AppdError, Result};
use crate::service::config::Config;
use crate::service::state::Status;
use crate::service::{Service, ServiceSnapshot};
use std::cmp::Reverse;
use tracing::{debug, info, Span};

/// Service name used for failures that concern the whole manager.
const ALL_SERVICES: &str = "all";

struct Inner {
    services: Vec<Service>,
    started: bool,
}

/// Owns the services of a provisioned config.
///
/// Start and Stop hold the same lock for their whole pass, so only one of
/// them runs at a time.
pub struct Manager {
    inner: tokio::sync::Mutex<Inner>,
    provisioned: bool,
    span: Span,
}

impl Default for Manager {
    /// Creates an unprovisioned manager; Start and Stop refuse to act.
    fn default() -> Self {
        Self {
            inner: tokio::sync::Mutex::new(Inner {
                services: Vec::new(),
                started: false,
            }),
            provisioned: false,
            span: Span::none(),
        }
    }
}

impl Manager {
    /// Finalizes `config` and creates one service per unit.
    ///
    /// Every log event of the manager and its services is emitted under
    /// `span`.
    pub fn new(mut config: Config, span: Span) -> Result<Self> {
        debug!(parent: &span, units = config.len(), "initializing manager");
        let services = config.services(&span)?;
        debug!(parent: &span, services = services.len(), "configured services");

        Ok(Self {
            inner: tokio::sync::Mutex::new(Inner {
                services,
                started: false,
            }),
            provisioned: true,
            span,
        })
    }

    /// Returns true once the manager was built from a valid config.
    pub fn is_provisioned(&self) -> bool {
        self.provisioned
    }

    /// Returns true after a Start pass without failures, until the next Stop.
    pub async fn is_started(&self) -> bool {
        self.inner.lock().await.started
    }

    /// Returns a serializable copy of every service in sequence order.
    pub async fn snapshot(&self) -> Vec<ServiceSnapshot> {
        let inner = self.inner.lock().await;
        inner.services.iter().map(Service::snapshot).collect()
    }

    /// Starts the services in ascending sequence order.
    ///
    /// A started manager refuses until the next Stop.
    /// Noop units are skipped. The first unit that fails aborts the pass: the
    /// returned list holds its status alone and later units are never
    /// attempted. An empty list means every unit started.
    pub async fn start(&self) -> Vec<Status> {
        let mut inner = self.inner.lock().await;
        if !self.provisioned {
            return vec![Status::failure(ALL_SERVICES, AppdError::NotProvisioned)];
        }
        if inner.started {
            return vec![Status::failure(ALL_SERVICES, AppdError::AlreadyStarted)];
        }

        info!(parent: &self.span, services = inner.services.len(), "starting services");
        for svc in inner.services.iter_mut() {
            if svc.unit().noop {
                debug!(parent: svc.span(), reason = "noop", "skipped starting service");
                continue;
            }

            if let Err(err) = svc.unit().validate_output_paths() {
                svc.fail(err);
                return vec![svc.status().clone()];
            }

            if svc.start().await.is_err() {
                return vec![svc.status().clone()];
            }
        }

        inner.started = true;
        info!(parent: &self.span, "started services");
        Vec::new()
    }

    /// Stops every service in descending sequence order.
    ///
    /// Noop units are skipped. A failure does not interrupt the pass; the
    /// returned list holds the status of every unit whose stop failed.
    pub async fn stop(&self) -> Vec<Status> {
        let mut inner = self.inner.lock().await;
        if !self.provisioned {
            return vec![Status::failure(ALL_SERVICES, AppdError::NotProvisioned)];
        }

        let mut order: Vec<usize> = (0..inner.services.len()).collect();
        order.sort_by_key(|&i| Reverse(inner.services[i].seq()));

        info!(parent: &self.span, services = order.len(), "stopping services");
        let mut failures = Vec::new();
        for i in order {
            let svc = &mut inner.services[i];
            if svc.unit().noop {
                debug!(parent: svc.span(), reason = "noop", "skipped stopping service");
                continue;
            }
            if svc.stop().await.is_err() {
                failures.push(svc.status().clone());
            }
        }

        inner.started = false;
        info!(parent: &self.span, failures = failures.len(), "stopped services");
        failures
    }
}
