#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::bare_urls)]

//! agent-orchestrator coordinates a sequence of dependent agent invocations
//! (search, extraction, summarization, reporting) as a single tracked job:
//! a linear workflow of steps, each delegated to a registered agent, with
//! per-step retry/backoff/timeout, a structured execution log, and an
//! inspectable job state a caller can poll asynchronously.
//!
//! ## Basic usage
//!
//! ```rust,no_run
//! use agent_orchestrator::agent::stubs::SearchStub;
//! use agent_orchestrator::{Orchestrator, Workflow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(None);
//!     orchestrator.register_agent("browser", SearchStub);
//!
//!     let workflow: Workflow = serde_json::from_value(serde_json::json!({
//!         "steps": [
//!             {"name": "search", "agent": "browser",
//!              "input": {"query": "latest AI research"}, "retry": 3, "timeout": 30.0}
//!         ]
//!     }))?;
//!
//!     // Returns immediately; the job runs in the background.
//!     let job = orchestrator.start_workflow(workflow).await?;
//!     orchestrator.wait(&job.id).await;
//!
//!     let finished = orchestrator.get_job(&job.id).await.expect("job was submitted");
//!     println!("{}: {:?}", finished.id, finished.status);
//!     Ok(())
//! }
//! ```

/// Agent contract, stub agents and the invocation adapter.
pub mod agent;

/// Error types for the submission surface.
pub mod error;

/// Workflow orchestration: jobs, steps, input resolution, registry.
pub mod workflow;

pub use agent::{Agent, AgentRegistry, AgentResult, AgentStatus, BlockingAgent, Payload};
pub use error::{Error, Result};
pub use workflow::{
    Job, JobStatus, Orchestrator, OrchestratorConfig, StepSpec, StepStatus, Workflow,
};
