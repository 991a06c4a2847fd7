//! End-to-end demo: the four-step research pipeline over stub agents.
//!
//! Registers the search/extract/summarize/report stubs, submits one
//! workflow, polls the job until it reaches a terminal state, and prints
//! the accumulated log, attempt history and results.

use std::time::Duration;

use agent_orchestrator::agent::stubs::{ExtractorStub, ReporterStub, SearchStub, SummarizerStub};
use agent_orchestrator::{Orchestrator, Workflow};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let orchestrator = Orchestrator::new(None);
    orchestrator.register_agent("browser", SearchStub);
    orchestrator.register_blocking_agent("extractor", ExtractorStub);
    orchestrator.register_agent("summarizer", SummarizerStub);
    orchestrator.register_blocking_agent("reporter", ReporterStub);

    let workflow: Workflow = serde_json::from_value(serde_json::json!({
        "steps": [
            {"name": "search", "agent": "browser",
             "input": {"query": "latest AI research"}, "retry": 2, "timeout": 20.0},
            {"name": "extract", "agent": "extractor",
             "input_path": "previous.steps.0.data.html", "retry": 2},
            {"name": "summarize", "agent": "summarizer",
             "input_path": "previous.steps.1.data.clean_text", "retry": 2, "timeout": 20.0},
            {"name": "report", "agent": "reporter",
             "input_path": "previous.steps.2.data.summary", "retry": 1}
        ],
        "metadata": {"requested_by": "demo@example.com"}
    }))?;

    let job = orchestrator.start_workflow(workflow).await?;
    println!("Started job: {}", job.id);

    loop {
        let Some(snapshot) = orchestrator.get_job(&job.id).await else {
            anyhow::bail!("job {} disappeared from the registry", job.id);
        };
        println!("JOB STATUS: {:?}", snapshot.status);

        if snapshot.status.is_terminal() {
            println!("=== LOGS ===");
            for entry in &snapshot.logs {
                println!("[{}] {:?}: {}", entry.ts, entry.level, entry.message);
            }
            println!("=== AGENT HISTORY ===");
            for record in &snapshot.agent_history {
                println!(
                    "{} attempt {} via {} ({} ms): {:?}",
                    record.step, record.attempt, record.agent, record.duration_ms,
                    record.result.status
                );
            }
            println!("=== RESULT ===");
            println!("{}", serde_json::to_string_pretty(&snapshot.results)?);
            break;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    Ok(())
}
