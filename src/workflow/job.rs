//! The mutable runtime record tracking one workflow's execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::AgentResult;
use super::spec::Workflow;

/// Lifecycle status of a job.
///
/// Execution starts on submission, so there is no pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Steps are still being executed.
    Running,
    /// Every step produced a success outcome.
    Finished,
    /// A step exhausted its retries without success; later steps never ran.
    Failed,
}

impl JobStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Severity of a job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Progress information.
    Info,
    /// A failed attempt that may still be retried.
    Warning,
    /// A terminal failure.
    Error,
}

/// One entry in a job's append-only execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was appended.
    pub ts: DateTime<Utc>,
    /// Entry severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
}

/// One agent invocation attempt, recorded in wall-clock order.
///
/// Attempt numbering restarts at 1 for each step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Name of the step this attempt belongs to.
    pub step: String,
    /// Name of the invoked agent.
    pub agent: String,
    /// 1-based attempt number within the step.
    pub attempt: u32,
    /// Wall-clock start of the invocation.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the invocation.
    pub finished_at: DateTime<Utc>,
    /// Invocation duration in milliseconds.
    pub duration_ms: u64,
    /// The raw result the agent reported.
    pub result: AgentResult,
}

/// Final status of one step after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// An attempt reported success.
    Success,
    /// The retry budget was exhausted without success.
    Failed,
}

/// Normalized per-step entry on the job's result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step status after retries.
    pub status: StepStatus,
    /// Step output; absent for failed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// The step executor's final verdict for one step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Success or failed.
    pub status: StepStatus,
    /// Output data on success.
    pub data: Option<Map<String, Value>>,
    /// The last raw agent result when the retry budget was exhausted.
    pub error: Option<AgentResult>,
}

impl StepOutcome {
    /// Successful outcome carrying the step's data.
    pub(crate) fn success(data: Map<String, Value>) -> Self {
        Self {
            status: StepStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    /// Failed outcome carrying the last agent result, if any attempt ran.
    pub(crate) fn failed(last: Option<AgentResult>) -> Self {
        Self {
            status: StepStatus::Failed,
            data: None,
            error: last,
        }
    }

    /// Whether the step succeeded.
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

impl From<&StepOutcome> for StepResult {
    fn from(outcome: &StepOutcome) -> Self {
        Self {
            status: outcome.status,
            data: outcome.data.clone(),
        }
    }
}

/// The runtime record tracking one workflow's execution: status, log,
/// attempt history and per-step results.
///
/// A job is mutated only by its own background execution task; callers see
/// clone snapshots through the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,
    /// When the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// The workflow this job executes.
    pub workflow: Workflow,
    /// Append-only execution log.
    pub logs: Vec<LogEntry>,
    /// One entry per agent invocation attempt.
    pub agent_history: Vec<AttemptRecord>,
    /// One entry per attempted step, in step order.
    pub results: Vec<StepResult>,
}

impl Job {
    /// Create a running job with empty log, history and results.
    pub(crate) fn new(id: String, workflow: Workflow) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            submitted_at: Utc::now(),
            finished_at: None,
            workflow,
            logs: Vec::new(),
            agent_history: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Append a log entry. Entries are monotonic, never rewritten.
    pub(crate) fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(LogEntry {
            ts: Utc::now(),
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_job_is_running_and_empty() {
        let workflow: Workflow = serde_json::from_value(json!({ "steps": [] })).unwrap();
        let job = Job::new("j1".to_string(), workflow);
        assert_eq!(job.status, JobStatus::Running);
        assert!(!job.status.is_terminal());
        assert!(job.logs.is_empty());
        assert!(job.agent_history.is_empty());
        assert!(job.results.is_empty());
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn step_result_drops_error_from_outcome() {
        let outcome = StepOutcome::failed(Some(crate::agent::AgentResult::failed("boom")));
        let result = StepResult::from(&outcome);
        assert_eq!(result.status, StepStatus::Failed);
        assert!(result.data.is_none());
    }

    #[test]
    fn job_serializes_with_lowercase_status() {
        let workflow: Workflow = serde_json::from_value(json!({ "steps": [] })).unwrap();
        let job = Job::new("j1".to_string(), workflow);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value.get("status"), Some(&json!("running")));
    }
}
