//! Input resolution for workflow steps.
//!
//! A step's payload comes from its literal `input`, optionally enriched by
//! projecting a field out of a prior step's recorded output. References are
//! parsed into an explicit [`InputRef`] first; resolution itself never
//! fails — a malformed path, an out-of-range index or a missing field
//! silently degrades to the payload built so far, and the downstream agent
//! is responsible for detecting missing required fields.

use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::job::StepResult;
use super::spec::StepSpec;

/// Reserved payload key carrying the projected output of a prior step.
pub const FROM_PREVIOUS_KEY: &str = "_from_previous";

/// Parse errors for step input references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputPathError {
    /// The reference does not start with `previous.steps.`.
    #[error("input path must start with 'previous.steps.'")]
    BadPrefix,

    /// The step index segment is not a non-negative integer.
    #[error("invalid step index '{0}'")]
    InvalidIndex(String),

    /// The `data` segment after the step index is missing.
    #[error("expected 'data' segment after the step index")]
    MissingData,

    /// No field segments follow `data`.
    #[error("input path names no field under 'data'")]
    EmptyFieldPath,
}

/// A parsed reference into a prior step's recorded output.
///
/// The stringly form `previous.steps.<index>.data.<field>...` is parsed
/// once, up front, so resolution only ever walks a validated reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRef {
    /// Index of the referenced step within the job's result list.
    pub step_index: usize,

    /// Field path walked through that step's `data` mapping.
    pub field_path: Vec<String>,
}

impl FromStr for InputRef {
    type Err = InputPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        if parts.next() != Some("previous") || parts.next() != Some("steps") {
            return Err(InputPathError::BadPrefix);
        }
        let index = parts.next().unwrap_or("");
        let step_index = index
            .parse()
            .map_err(|_| InputPathError::InvalidIndex(index.to_string()))?;
        if parts.next() != Some("data") {
            return Err(InputPathError::MissingData);
        }
        let field_path: Vec<String> = parts.map(str::to_string).collect();
        if field_path.is_empty() {
            return Err(InputPathError::EmptyFieldPath);
        }
        Ok(Self {
            step_index,
            field_path,
        })
    }
}

/// Build the payload for a step from its literal input and, when an
/// `input_path` is present, a projection of a prior step's output attached
/// under [`FROM_PREVIOUS_KEY`].
///
/// Reads only already-completed results; resolution misses degrade silently.
pub fn resolve_input(step: &StepSpec, results: &[StepResult]) -> Map<String, Value> {
    let mut payload = step.input.clone().unwrap_or_default();
    let Some(path) = step.input_path.as_deref() else {
        return payload;
    };

    let reference: InputRef = match path.parse() {
        Ok(reference) => reference,
        Err(err) => {
            debug!(path, error = %err, "ignoring unparsable input path");
            return payload;
        }
    };

    match project(&reference, results) {
        Some(value) => {
            payload.insert(FROM_PREVIOUS_KEY.to_string(), value);
        }
        None => {
            debug!(path, "input path did not resolve; payload left as-is");
        }
    }
    payload
}

/// Walk a prior step's `data` mapping along the field path.
fn project(reference: &InputRef, results: &[StepResult]) -> Option<Value> {
    let data = results.get(reference.step_index)?.data.as_ref()?;
    let (first, rest) = reference.field_path.split_first()?;
    let mut current = data.get(first)?;
    for field in rest {
        current = current.as_object()?.get(field)?;
    }
    Some(current.clone())
}
