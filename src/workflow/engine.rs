//! The orchestrator: workflow submission and the per-job state machine.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::agent::{Agent, AgentRegistry, BlockingAgent};
use crate::error::Result;
use super::job::{Job, JobStatus, LogLevel, StepResult};
use super::registry::JobRegistry;
use super::spec::Workflow;
use super::step::run_step;

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Base delay for the exponential retry backoff, in milliseconds.
    /// The delay after the n-th failed attempt is `base * 2^(n-1)`.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay, in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 500,
            backoff_max_ms: 60_000,
        }
    }
}

/// Coordinates multi-agent workflows.
///
/// Holds the registered agent set and the job table. Submission creates a
/// running job and spawns its execution in the background; distinct jobs
/// run concurrently while each job's own steps execute strictly
/// sequentially. Callers poll [`get_job`](Self::get_job) until the job
/// reaches a terminal state.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    agents: Arc<AgentRegistry>,
    jobs: Arc<JobRegistry>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Orchestrator {
    /// Create an orchestrator; `None` uses the default configuration.
    pub fn new(config: impl Into<Option<OrchestratorConfig>>) -> Self {
        Self {
            config: config.into().unwrap_or_default(),
            agents: Arc::new(AgentRegistry::new()),
            jobs: Arc::new(JobRegistry::new()),
        }
    }

    /// Register a suspension-capable agent under a name.
    pub fn register_agent<A: Agent>(&self, name: impl Into<String>, agent: A) {
        self.agents.register(name, agent);
    }

    /// Register a synchronous agent under a name; it will run on the
    /// blocking pool so it cannot stall unrelated jobs.
    pub fn register_blocking_agent<A: BlockingAgent>(&self, name: impl Into<String>, agent: A) {
        self.agents.register_blocking(name, agent);
    }

    /// The job registry, for snapshotting, listing and awaiting jobs.
    pub fn registry(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Submit a workflow: create a running job, start executing it in the
    /// background and return a snapshot immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`](crate::error::Error::Validation) for a
    /// malformed workflow and
    /// [`Error::DuplicateJob`](crate::error::Error::DuplicateJob) when the
    /// caller-supplied identifier is already taken. Execution failures are
    /// never surfaced here — they end up in the job's own state.
    #[instrument(skip(self, workflow))]
    pub async fn start_workflow(&self, workflow: Workflow) -> Result<Job> {
        workflow.validate()?;
        let id = workflow
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let job = Job::new(id.clone(), workflow);
        let snapshot = job.clone();
        let slot = self.jobs.insert(job).await?;

        let agents = Arc::clone(&self.agents);
        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            execute(slot, agents, config).await;
        });
        self.jobs.attach(&id, handle).await;

        info!(job = %id, steps = snapshot.workflow.steps.len(), "workflow submitted");
        Ok(snapshot)
    }

    /// Snapshot of a job by identifier, or `None` if unknown.
    pub async fn get_job(&self, id: &str) -> Option<Job> {
        self.jobs.snapshot(id).await
    }

    /// Snapshots of all known jobs.
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.jobs.list().await
    }

    /// Await a job's background task. See [`JobRegistry::wait`].
    pub async fn wait(&self, id: &str) {
        self.jobs.wait(id).await
    }
}

/// Background driver: run a job's steps in order and settle its status.
///
/// Stops at the first step whose outcome is not success; remaining steps
/// never run. Termination is guaranteed because every step's retry loop is
/// bounded.
async fn execute(job: Arc<RwLock<Job>>, agents: Arc<AgentRegistry>, config: OrchestratorConfig) {
    let (id, steps) = {
        let job = job.read().await;
        (job.id.clone(), job.workflow.steps.clone())
    };

    for (index, step) in steps.iter().enumerate() {
        let outcome = run_step(&job, index, step, &agents, &config).await;
        let step_result = StepResult::from(&outcome);

        let mut guard = job.write().await;
        guard.results.push(step_result);

        if !outcome.is_success() {
            let name = step.display_name(index);
            guard.status = JobStatus::Failed;
            guard.finished_at = Some(Utc::now());
            guard.log(
                LogLevel::Error,
                format!("Workflow failed at step {index} ({name})"),
            );
            error!(job = %id, step = index, step_name = %name, "workflow failed");
            return;
        }
    }

    let mut guard = job.write().await;
    guard.status = JobStatus::Finished;
    guard.finished_at = Some(Utc::now());
    guard.log(LogLevel::Info, "Workflow completed successfully");
    info!(job = %id, "workflow finished");
}
