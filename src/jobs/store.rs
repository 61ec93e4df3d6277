//! In-memory job store

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::types::{Job, JobId, JobStatus};

/// Concurrency-safe map from job key to job record
///
/// Cloning is cheap and every clone sees the same jobs. Reads return snapshots;
/// all mutation goes through [`JobStore::update`], which runs the closure under
/// the write lock so concurrent updates are never lost.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job
    ///
    /// A failed job under the same key is replaced, so a failed export can be
    /// retried. Any other existing job yields [`Error::Conflict`].
    pub async fn create(&self, job: Job) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        if let Some(existing) = jobs.get(&job.id) {
            if existing.status() != JobStatus::Failed {
                return Err(Error::Conflict {
                    id: job.id.clone(),
                    status: existing.status().to_string(),
                });
            }
            tracing::debug!(job_id = %job.id, "replacing failed job");
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    /// Snapshot of a job
    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    /// Mutate a job in place; `None` if the key is unknown
    pub async fn update<F, R>(&self, id: &JobId, mutate: F) -> Option<R>
    where
        F: FnOnce(&mut Job) -> R,
    {
        self.jobs.write().await.get_mut(id).map(mutate)
    }

    /// Number of jobs in the store
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether the store holds no jobs
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Number of jobs not yet in a terminal state
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|job| !job.is_terminal())
            .count()
    }
}
