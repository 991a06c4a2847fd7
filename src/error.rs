//! Error types for the orchestrator's submission surface.
//!
//! Execution-path failures never appear here: anything that goes wrong while
//! a job is running (an unknown agent, an agent fault, a timeout) is captured
//! by value in [`AgentResult`](crate::agent::AgentResult) and the job's
//! log/result trail, so a background task can never crash the process.

use thiserror::Error;

/// A specialized Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned when submitting work to the orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    /// A job with the same identifier is already registered.
    #[error("job '{0}' already exists")]
    DuplicateJob(String),

    /// The submitted workflow is malformed.
    #[error("invalid workflow: {0}")]
    Validation(String),
}
