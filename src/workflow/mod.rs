//! Workflow orchestration: job lifecycle, sequential step execution,
//! input resolution and the in-memory job registry.
//!
//! A submitted [`Workflow`] becomes a [`Job`] that runs in the background;
//! each step is delegated to a registered agent with per-step
//! retry/backoff/timeout, and the job accumulates a structured log, an
//! attempt history and per-step results that callers poll asynchronously.

/// The orchestrator and its configuration.
pub mod engine;
/// Input references and payload resolution.
pub mod input;
/// Job records, logs, history and step outcomes.
pub mod job;
/// The concurrency-safe job table.
pub mod registry;
/// Workflow and step declarations.
pub mod spec;
/// Per-step retry/backoff execution.
mod step;

pub use engine::{Orchestrator, OrchestratorConfig};
pub use input::{resolve_input, InputPathError, InputRef, FROM_PREVIOUS_KEY};
pub use job::{
    AttemptRecord, Job, JobStatus, LogEntry, LogLevel, StepOutcome, StepResult, StepStatus,
};
pub use registry::JobRegistry;
pub use spec::{StepSpec, Workflow};
