//! appd - Lightweight declarative process supervisor
//!
//! This crate starts a declared list of units in order and stops them in
//! reverse order. A unit is either a `command`, run to completion during
//! startup, or an `app`, a long-running process that is interrupted on
//! shutdown and killed if it does not exit within a grace period.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`config`] - Configuration file parsing and unit directives
//! - [`error`] - Error types and error handling
//! - [`service`] - Units, services, workers and the manager

pub mod cli;
pub mod config;
pub mod error;
pub mod service;

// Re-exports for convenience
pub use cli::Cli;
pub use config::AppConfig;
pub use error::{AppdError, Result};
pub use service::{Config, Manager, State, Status, Unit};
