//! Host runner for the serial bridge firmware.
//!
//! Provides the cooperative [`scheduler`] loop and the host-side stand-ins for
//! the board's collaborators: stdio serial, UDP radio, a file-backed
//! configuration word and synthetic sensors. The `sbp` binary picks a
//! [`Role`] and wires them together.

pub mod clock;
pub mod config;
pub mod error;
pub mod hooks;
pub mod persist;
pub mod radio;
pub mod remote;
pub mod roles;
pub mod scheduler;
pub mod sensors;
pub mod serial;

pub use config::{Cli, Role, RunnerConfig};
pub use error::{RunnerError, RunnerResult};
pub use scheduler::{PeriodOutcome, Scheduler, SchedulerConfig};
