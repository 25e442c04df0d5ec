//! Flowsentry daemon library surface.
//!
//! Exposed as a library so integration tests can drive the
//! orchestrator, health aggregation, and module registry directly.

pub mod cli;
pub mod health;
pub mod logging;
pub mod metrics_server;
pub mod modules;
pub mod orchestrator;

pub use cli::DaemonCli;
pub use health::{DaemonHealth, ModuleHealth, aggregate_status};
pub use orchestrator::Orchestrator;
