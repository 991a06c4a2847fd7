//! In-memory job registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{Error, Result};
use super::job::Job;

/// Concurrency-safe table of jobs and their background execution tasks.
///
/// The table is the only state touched by more than one logical flow
/// (submission vs. background execution), so it sits behind a lock; each
/// job's own fields are written exclusively by that job's task and need no
/// further coordination. Readers get clone snapshots — a snapshot taken
/// mid-run simply shows the log/history up to that point, which is safe
/// because those lists are append-only.
///
/// Task lifecycle: a job's task is spawned on submission and attached here;
/// it can be awaited with [`wait`](Self::wait) and is abandoned (left to
/// the runtime) when the registry is dropped.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, Arc<RwLock<Job>>>>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job, rejecting duplicate identifiers.
    pub(crate) async fn insert(&self, job: Job) -> Result<Arc<RwLock<Job>>> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(Error::DuplicateJob(job.id.clone()));
        }
        let id = job.id.clone();
        let slot = Arc::new(RwLock::new(job));
        jobs.insert(id, Arc::clone(&slot));
        Ok(slot)
    }

    /// Attach the background task handle for a job.
    pub(crate) async fn attach(&self, id: &str, handle: JoinHandle<()>) {
        self.handles.lock().await.insert(id.to_string(), handle);
    }

    /// Snapshot of one job, or `None` for an unknown identifier.
    pub async fn snapshot(&self, id: &str) -> Option<Job> {
        let slot = { self.jobs.lock().await.get(id).cloned() };
        match slot {
            Some(slot) => Some(slot.read().await.clone()),
            None => None,
        }
    }

    /// Snapshots of all known jobs, in no particular order.
    pub async fn list(&self) -> Vec<Job> {
        let slots: Vec<_> = { self.jobs.lock().await.values().cloned().collect() };
        let mut jobs = Vec::with_capacity(slots.len());
        for slot in slots {
            jobs.push(slot.read().await.clone());
        }
        jobs
    }

    /// Await a job's background task, if one is still attached.
    ///
    /// Detaches the handle; a second call for the same id returns
    /// immediately. Useful for tests and orderly shutdown — a running job
    /// cannot be cancelled, only waited for.
    pub async fn wait(&self, id: &str) {
        let handle = { self.handles.lock().await.remove(id) };
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(job = %id, error = %err, "job task panicked or was aborted");
            }
        }
    }
}
