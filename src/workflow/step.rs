//! Step execution: the retry/backoff loop around one agent invocation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::agent::{AgentRegistry, AgentResult};
use super::engine::OrchestratorConfig;
use super::input::resolve_input;
use super::job::{AttemptRecord, Job, LogLevel, StepOutcome};
use super::spec::StepSpec;

/// Run one step to completion against its retry policy.
///
/// Each attempt resolves the step's input against the job's completed
/// results, invokes the agent with the step timeout, and records an
/// [`AttemptRecord`] plus log entries on the job. Failed attempts back off
/// exponentially before the next one; the delay is skipped after the final
/// attempt. This function never fails — all failure information is carried
/// in the returned outcome and the job's log.
pub(crate) async fn run_step(
    job: &Arc<RwLock<Job>>,
    step_index: usize,
    step: &StepSpec,
    agents: &AgentRegistry,
    config: &OrchestratorConfig,
) -> StepOutcome {
    let name = step.display_name(step_index);
    let attempts = step.retry;
    let mut last_result: Option<AgentResult> = None;

    for attempt in 1..=attempts {
        let payload = {
            let mut job = job.write().await;
            job.log(
                LogLevel::Info,
                format!("Starting {name} (agent={}) attempt {attempt}", step.agent),
            );
            // Resolution only ever sees already-completed results; this
            // step's own entry is appended after it reaches an outcome.
            resolve_input(step, &job.results)
        };
        debug!(step = %name, agent = %step.agent, attempt, "invoking agent");

        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let result = agents
            .invoke(&step.agent, payload, step.timeout_duration())
            .await;
        let finished_at = Utc::now();
        let duration_ms = clock.elapsed().as_millis() as u64;

        let status_label = if result.is_success() { "success" } else { "failed" };
        {
            let mut job = job.write().await;
            job.agent_history.push(AttemptRecord {
                step: name.clone(),
                agent: step.agent.clone(),
                attempt,
                started_at,
                finished_at,
                duration_ms,
                result: result.clone(),
            });
            job.log(
                LogLevel::Info,
                format!("Finished {name} attempt {attempt} status={status_label}"),
            );
        }

        if result.is_success() {
            info!(step = %name, attempt, duration_ms, "step succeeded");
            let data = result
                .data
                .clone()
                .unwrap_or_else(|| whole_result(&result));
            return StepOutcome::success(data);
        }

        let error = result
            .error
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        warn!(step = %name, attempt, error = %error, "attempt failed");
        {
            let mut job = job.write().await;
            job.log(
                LogLevel::Warning,
                format!("{name} attempt {attempt} failed: {error}"),
            );
        }
        last_result = Some(result);

        if attempt < attempts {
            let delay = backoff_delay(attempt, config);
            debug!(step = %name, attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }

    StepOutcome::failed(last_result)
}

/// Exponential backoff after the n-th failed attempt: `base * 2^(n-1)`,
/// capped at the configured maximum.
fn backoff_delay(attempt: u32, config: &OrchestratorConfig) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    let delay_ms = config
        .backoff_base_ms
        .saturating_mul(factor)
        .min(config.backoff_max_ms);
    Duration::from_millis(delay_ms)
}

/// Fallback for agents that report success without a `data` field: the
/// whole serialized result stands in for the data, matching the agent
/// result contract.
fn whole_result(result: &AgentResult) -> Map<String, Value> {
    match serde_json::to_value(result) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
