//! Core services for toolgate: command validation, tool detection with a
//! TTL cache, and time-boxed subprocess execution.
//!
//! The composition root is [`orchestrator::ExecutionService`]; the HTTP layer
//! in `toolgate-server` holds one instance of it plus the shared
//! [`cache::DetectionCache`] and never constructs the leaves directly.

pub mod cache;
pub mod detect;
pub mod error;
pub mod exec;
pub mod orchestrator;
pub mod validator;

pub use cache::DetectionCache;
pub use detect::{SystemProbe, ToolProbe};
pub use error::ExecError;
pub use exec::ProcessExecutor;
pub use orchestrator::{ExecutionLimits, ExecutionService};
