//! Declarative workflow and step descriptions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

fn default_retry() -> u32 {
    1
}

/// Declarative description of one workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Human-readable step name; defaults to `step_<index>` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Name of the registered agent to invoke.
    pub agent: String,

    /// Literal input payload for the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Map<String, Value>>,

    /// Reference into a prior step's output, in the form
    /// `previous.steps.<index>.data.<field>[.<field>...]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,

    /// Total number of attempts for this step (not extra retries).
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Per-attempt timeout in seconds; absent means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl StepSpec {
    /// Step name, falling back to `step_<index>`.
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("step_{index}"))
    }

    /// Per-attempt timeout as a [`Duration`].
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs_f64)
    }
}

/// The caller-supplied ordered list of steps plus metadata, submitted once
/// per job. Immutable after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Optional caller-supplied job identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Ordered step specifications.
    #[serde(default)]
    pub steps: Vec<StepSpec>,

    /// Free-form metadata carried on the job record.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Workflow {
    /// Validate the workflow before a job is created for it.
    pub(crate) fn validate(&self) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            let name = step.display_name(index);
            if step.agent.is_empty() {
                return Err(Error::Validation(format!(
                    "step '{name}': agent name must not be empty"
                )));
            }
            if step.retry == 0 {
                return Err(Error::Validation(format!(
                    "step '{name}': retry must be at least 1"
                )));
            }
            if step.input.is_some() && step.input_path.is_some() {
                return Err(Error::Validation(format!(
                    "step '{name}': input and input_path are mutually exclusive"
                )));
            }
        }
        Ok(())
    }
}
