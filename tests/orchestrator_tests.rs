use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_orchestrator::agent::stubs::ExtractorStub;
use agent_orchestrator::workflow::FROM_PREVIOUS_KEY;
use agent_orchestrator::{
    Agent, AgentResult, Error, JobStatus, Orchestrator, OrchestratorConfig, Payload, StepStatus,
    Workflow,
};
use async_trait::async_trait;
use serde_json::{json, Value};

fn workflow(value: Value) -> Workflow {
    serde_json::from_value(value).expect("valid workflow json")
}

/// Config with negligible backoff so failure tests finish quickly.
fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        backoff_base_ms: 1,
        backoff_max_ms: 10,
    }
}

struct AlwaysSucceeds;

#[async_trait]
impl Agent for AlwaysSucceeds {
    async fn run(&self, _payload: Payload) -> anyhow::Result<AgentResult> {
        Ok(AgentResult::success(
            json!({ "ok": true }).as_object().cloned().unwrap(),
        ))
    }
}

struct AlwaysFails;

#[async_trait]
impl Agent for AlwaysFails {
    async fn run(&self, _payload: Payload) -> anyhow::Result<AgentResult> {
        Ok(AgentResult::failed("boom"))
    }
}

/// Echoes its resolved payload back as data.
struct Echo;

#[async_trait]
impl Agent for Echo {
    async fn run(&self, payload: Payload) -> anyhow::Result<AgentResult> {
        Ok(AgentResult::success(payload))
    }
}

/// Fails every attempt and records when each invocation started.
#[derive(Clone)]
struct FailingRecorder {
    calls: Arc<Mutex<Vec<tokio::time::Instant>>>,
}

#[async_trait]
impl Agent for FailingRecorder {
    async fn run(&self, _payload: Payload) -> anyhow::Result<AgentResult> {
        self.calls.lock().unwrap().push(tokio::time::Instant::now());
        Ok(AgentResult::failed("still broken"))
    }
}

struct Sleepy;

#[async_trait]
impl Agent for Sleepy {
    async fn run(&self, payload: Payload) -> anyhow::Result<AgentResult> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(AgentResult::success(payload))
    }
}

#[tokio::test]
async fn all_steps_succeeding_finishes_with_one_attempt_each() {
    let orchestrator = Orchestrator::new(None);
    orchestrator.register_agent("ok", AlwaysSucceeds);

    let job = orchestrator
        .start_workflow(workflow(json!({
            "steps": [
                { "name": "a", "agent": "ok" },
                { "name": "b", "agent": "ok", "retry": 3 },
                { "name": "c", "agent": "ok" }
            ]
        })))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Running);

    orchestrator.wait(&job.id).await;
    let job = orchestrator.get_job(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Finished);
    assert!(job.finished_at.is_some());
    assert_eq!(job.results.len(), 3);
    assert!(job.results.iter().all(|r| r.status == StepStatus::Success));
    // One attempt per step, numbered 1, even where more were permitted.
    assert_eq!(job.agent_history.len(), 3);
    assert!(job.agent_history.iter().all(|h| h.attempt == 1));
}

#[tokio::test]
async fn retry_budget_exhaustion_fails_the_job_and_skips_later_steps() {
    let orchestrator = Orchestrator::new(fast_config());
    orchestrator.register_agent("bad", AlwaysFails);
    orchestrator.register_agent("ok", AlwaysSucceeds);

    let job = orchestrator
        .start_workflow(workflow(json!({
            "steps": [
                { "name": "doomed", "agent": "bad", "retry": 3 },
                { "name": "never", "agent": "ok" }
            ]
        })))
        .await
        .unwrap();
    orchestrator.wait(&job.id).await;
    let job = orchestrator.get_job(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    // Result list covers only the attempted step; the second never ran.
    assert_eq!(job.results.len(), 1);
    assert_eq!(job.results[0].status, StepStatus::Failed);
    assert!(job.results[0].data.is_none());
    // Exactly `retry` attempts, numbered from 1.
    assert_eq!(job.agent_history.len(), 3);
    let attempts: Vec<u32> = job.agent_history.iter().map(|h| h.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(job
        .agent_history
        .iter()
        .all(|h| h.result.error.as_deref() == Some("boom")));
    // The failure log names the step index and name.
    assert!(job
        .logs
        .iter()
        .any(|l| l.message.contains("failed at step 0 (doomed)")));
}

#[tokio::test(start_paused = true)]
async fn backoff_delays_follow_the_exponential_schedule() {
    // Default config: 0.5s base, doubling per failed attempt.
    let orchestrator = Orchestrator::new(None);
    let calls = Arc::new(Mutex::new(Vec::new()));
    orchestrator.register_agent(
        "flaky",
        FailingRecorder {
            calls: Arc::clone(&calls),
        },
    );

    let job = orchestrator
        .start_workflow(workflow(json!({
            "steps": [{ "agent": "flaky", "retry": 4 }]
        })))
        .await
        .unwrap();
    orchestrator.wait(&job.id).await;

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 4);
    let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
    let expected = [
        Duration::from_millis(500),
        Duration::from_millis(1000),
        Duration::from_millis(2000),
    ];
    for (gap, expected) in gaps.iter().zip(expected) {
        assert!(
            *gap >= expected && *gap < expected + Duration::from_millis(50),
            "gap {gap:?} does not approximate {expected:?}"
        );
    }
    assert!(gaps[0] < gaps[1] && gaps[1] < gaps[2], "delays must increase");
}

#[tokio::test]
async fn projection_feeds_the_next_step_and_misses_degrade() {
    let orchestrator = Orchestrator::new(None);
    orchestrator.register_agent("seed", AlwaysSucceeds);
    orchestrator.register_agent("echo", Echo);

    let job = orchestrator
        .start_workflow(workflow(json!({
            "steps": [
                { "agent": "seed" },
                { "agent": "echo", "input_path": "previous.steps.0.data.ok" },
                { "agent": "echo", "input_path": "previous.steps.9.data.missing" }
            ]
        })))
        .await
        .unwrap();
    orchestrator.wait(&job.id).await;
    let job = orchestrator.get_job(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Finished);
    let projected = job.results[1].data.as_ref().unwrap();
    assert_eq!(projected.get(FROM_PREVIOUS_KEY), Some(&json!(true)));
    // Out-of-range reference: payload arrives without the reserved key.
    let degraded = job.results[2].data.as_ref().unwrap();
    assert!(!degraded.contains_key(FROM_PREVIOUS_KEY));
}

#[tokio::test]
async fn unregistered_agent_fails_the_step_without_throwing() {
    let orchestrator = Orchestrator::new(fast_config());

    let job = orchestrator
        .start_workflow(workflow(json!({
            "steps": [{ "agent": "ghost", "retry": 2 }]
        })))
        .await
        .unwrap();
    orchestrator.wait(&job.id).await;
    let job = orchestrator.get_job(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.agent_history.len(), 2);
    for record in &job.agent_history {
        assert_eq!(
            record.result.error.as_deref(),
            Some("agent 'ghost' not registered")
        );
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_fails_the_attempt_instead_of_hanging() {
    let orchestrator = Orchestrator::new(fast_config());
    orchestrator.register_agent("slow", Sleepy);

    let job = orchestrator
        .start_workflow(workflow(json!({
            "steps": [{ "agent": "slow", "retry": 2, "timeout": 0.5 }]
        })))
        .await
        .unwrap();
    orchestrator.wait(&job.id).await;
    let job = orchestrator.get_job(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.agent_history.len(), 2);
    assert!(job
        .agent_history
        .iter()
        .all(|h| h.result.error.as_deref() == Some("timeout")));
}

/// The browser → extractor scenario: step 0's html is projected into the
/// extractor's payload, which strips the markup.
#[tokio::test]
async fn browser_extractor_pipeline_produces_clean_text() {
    struct Browser;

    #[async_trait]
    impl Agent for Browser {
        async fn run(&self, _payload: Payload) -> anyhow::Result<AgentResult> {
            Ok(AgentResult::success(
                json!({ "html": "<p>hi</p>" }).as_object().cloned().unwrap(),
            ))
        }
    }

    let orchestrator = Orchestrator::new(None);
    orchestrator.register_agent("browser", Browser);
    orchestrator.register_blocking_agent("extractor", ExtractorStub);

    let job = orchestrator
        .start_workflow(workflow(json!({
            "steps": [
                { "agent": "browser", "retry": 1 },
                { "agent": "extractor",
                  "input_path": "previous.steps.0.data.html", "retry": 1 }
            ]
        })))
        .await
        .unwrap();
    orchestrator.wait(&job.id).await;
    let job = orchestrator.get_job(&job.id).await.unwrap();

    assert_eq!(job.status, JobStatus::Finished);
    assert_eq!(job.results.len(), 2);
    assert_eq!(
        job.results[0].data.as_ref().unwrap().get("html"),
        Some(&json!("<p>hi</p>"))
    );
    assert_eq!(
        job.results[1].data.as_ref().unwrap().get("clean_text"),
        Some(&json!("hi"))
    );
}

#[tokio::test]
async fn duplicate_explicit_job_id_is_rejected() {
    let orchestrator = Orchestrator::new(None);
    orchestrator.register_agent("ok", AlwaysSucceeds);

    let spec = json!({ "id": "job-1", "steps": [{ "agent": "ok" }] });
    orchestrator
        .start_workflow(workflow(spec.clone()))
        .await
        .unwrap();
    let err = orchestrator
        .start_workflow(workflow(spec))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateJob(id) if id == "job-1"));
}

#[tokio::test]
async fn invalid_workflows_are_rejected_at_submission() {
    let orchestrator = Orchestrator::new(None);

    let err = orchestrator
        .start_workflow(workflow(json!({
            "steps": [{ "agent": "ok", "retry": 0 }]
        })))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = orchestrator
        .start_workflow(workflow(json!({
            "steps": [{
                "agent": "ok",
                "input": { "q": 1 },
                "input_path": "previous.steps.0.data.x"
            }]
        })))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn distinct_jobs_run_concurrently_and_independently() {
    let orchestrator = Orchestrator::new(fast_config());
    orchestrator.register_agent("ok", AlwaysSucceeds);
    orchestrator.register_agent("bad", AlwaysFails);

    let good = orchestrator
        .start_workflow(workflow(json!({
            "id": "good", "steps": [{ "agent": "ok" }, { "agent": "ok" }]
        })))
        .await
        .unwrap();
    let bad = orchestrator
        .start_workflow(workflow(json!({
            "id": "bad", "steps": [{ "agent": "bad", "retry": 2 }]
        })))
        .await
        .unwrap();

    orchestrator.wait(&good.id).await;
    orchestrator.wait(&bad.id).await;

    assert_eq!(
        orchestrator.get_job("good").await.unwrap().status,
        JobStatus::Finished
    );
    assert_eq!(
        orchestrator.get_job("bad").await.unwrap().status,
        JobStatus::Failed
    );
    assert_eq!(orchestrator.list_jobs().await.len(), 2);
    assert!(orchestrator.get_job("unknown").await.is_none());
}

#[tokio::test]
async fn metadata_and_workflow_survive_on_the_job_record() {
    let orchestrator = Orchestrator::new(None);
    orchestrator.register_agent("ok", AlwaysSucceeds);

    let job = orchestrator
        .start_workflow(workflow(json!({
            "steps": [{ "agent": "ok" }],
            "metadata": { "requested_by": "you@example.com" }
        })))
        .await
        .unwrap();
    orchestrator.wait(&job.id).await;
    let job = orchestrator.get_job(&job.id).await.unwrap();

    assert_eq!(
        job.workflow.metadata.get("requested_by"),
        Some(&json!("you@example.com"))
    );
    assert!(job.finished_at.unwrap() >= job.submitted_at);
}
