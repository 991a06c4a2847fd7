//! Agent contract and invocation adapter.
//!
//! Agents are the external collaborators that do the actual domain work
//! (search, extraction, summarization, reporting). The orchestrator only
//! knows their calling convention: a payload mapping goes in, an
//! [`AgentResult`] comes out. Two capabilities exist — [`Agent`] for
//! suspension-capable implementations and [`BlockingAgent`] for synchronous
//! ones, which are moved onto the blocking pool at registration time so a
//! slow agent can never stall unrelated jobs.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub mod stubs;

/// Payload handed to an agent: a JSON object.
pub type Payload = Map<String, Value>;

/// Status reported by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// The agent produced usable output.
    Success,
    /// The agent failed; `error` carries the reason.
    Failed,
}

/// The normalized result every agent returns.
///
/// This is the atomic unit the input resolver and step executor reason
/// about; anything an agent cannot express here is a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Reported status; anything other than success counts as a failure.
    pub status: AgentStatus,

    /// Structured output of the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,

    /// Error message for failed results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Diagnostic detail: the error chain or panic payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AgentResult {
    /// Create a success result carrying the given data.
    pub fn success(data: Payload) -> Self {
        Self {
            status: AgentStatus::Success,
            data: Some(data),
            error: None,
            detail: None,
        }
    }

    /// Create a failed result with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::Failed,
            data: None,
            error: Some(error.into()),
            detail: None,
        }
    }

    /// Create a failed result with an error message and diagnostic detail.
    pub fn failed_with_detail(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::Failed,
            data: None,
            error: Some(error.into()),
            detail: Some(detail.into()),
        }
    }

    /// Check whether the agent reported success.
    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Success
    }
}

/// A suspension-capable agent.
///
/// Implementations return `Err` for faults they cannot express as a failed
/// [`AgentResult`]; the invocation adapter normalizes either into a failed
/// result, so agent failures never propagate as process-level faults.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Run the agent against a payload.
    async fn run(&self, payload: Payload) -> anyhow::Result<AgentResult>;
}

/// A synchronous agent.
///
/// Registered through [`AgentRegistry::register_blocking`], which fixes the
/// calling convention once: every invocation runs on the blocking pool and
/// cannot block the shared event loop.
pub trait BlockingAgent: Send + Sync + 'static {
    /// Run the agent against a payload.
    fn run(&self, payload: Payload) -> anyhow::Result<AgentResult>;
}

/// Adapter that lifts a [`BlockingAgent`] into the async calling convention.
struct BlockingAdapter<A>(Arc<A>);

#[async_trait]
impl<A: BlockingAgent> Agent for BlockingAdapter<A> {
    async fn run(&self, payload: Payload) -> anyhow::Result<AgentResult> {
        let agent = Arc::clone(&self.0);
        tokio::task::spawn_blocking(move || agent.run(payload)).await?
    }
}

/// Registry of named agents: the single calling convention the step
/// executor goes through.
///
/// Agents are registered before any workflow referencing them is submitted;
/// invoking an unregistered name is a normal failed outcome, not an error.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a suspension-capable agent under a name.
    ///
    /// Re-registering a name replaces the previous agent.
    pub fn register<A: Agent>(&self, name: impl Into<String>, agent: A) {
        let name = name.into();
        debug!(agent = %name, "registering agent");
        self.agents.write().unwrap().insert(name, Arc::new(agent));
    }

    /// Register a synchronous agent under a name.
    ///
    /// The blocking adapter is applied here, once, so the dispatch variant
    /// is resolved at registration time rather than per call.
    pub fn register_blocking<A: BlockingAgent>(&self, name: impl Into<String>, agent: A) {
        self.register(name, BlockingAdapter(Arc::new(agent)));
    }

    /// Check whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.agents.read().unwrap().contains_key(name)
    }

    /// Invoke a registered agent with a payload and an optional per-attempt
    /// timeout.
    ///
    /// Never returns an error: unknown names, agent faults, panics and
    /// timeouts are all normalized into a failed [`AgentResult`]. The
    /// invocation runs in its own task; on timeout the task is aborted
    /// (best-effort cancellation) and no partial result is surfaced.
    pub async fn invoke(
        &self,
        name: &str,
        payload: Payload,
        limit: Option<Duration>,
    ) -> AgentResult {
        let agent = { self.agents.read().unwrap().get(name).cloned() };
        let Some(agent) = agent else {
            return AgentResult::failed(format!("agent '{name}' not registered"));
        };

        let handle = tokio::spawn(async move { agent.run(payload).await });
        let abort = handle.abort_handle();

        let joined = match limit {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    warn!(agent = %name, timeout = ?limit, "invocation timed out");
                    return AgentResult::failed("timeout");
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(agent = %name, error = %err, "agent returned an error");
                AgentResult::failed_with_detail(err.to_string(), format!("{err:?}"))
            }
            Err(err) => {
                warn!(agent = %name, error = %err, "agent task panicked or was cancelled");
                AgentResult::failed_with_detail(format!("agent '{name}' panicked"), err.to_string())
            }
        }
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.agents.read().unwrap().keys().cloned().collect();
        f.debug_struct("AgentRegistry").field("agents", &names).finish()
    }
}
