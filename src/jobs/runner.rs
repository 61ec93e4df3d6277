//! Per-job retry loop around the fetcher

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::store::JobStore;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::types::{Event, Job, JobId, ProgressUpdate};

/// Drives one job from Pending to a terminal state
///
/// Each attempt moves the job to Running and bumps `attempts` before the
/// fetcher is invoked. Rate-limited runs are retried after a fixed pause until
/// `max_attempts` is reached; any other failure is final.
pub(crate) struct JobRunner {
    pub(crate) id: JobId,
    pub(crate) source_url: String,
    pub(crate) work_dir: PathBuf,
    pub(crate) store: JobStore,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) max_attempts: u32,
    pub(crate) backoff: Duration,
    pub(crate) cancel: CancellationToken,
}

impl JobRunner {
    /// Run until the job is terminal or shutdown is requested
    ///
    /// On shutdown the job keeps whatever non-terminal state it had.
    pub(crate) async fn run(self) {
        loop {
            let now = Utc::now();
            let Some(attempt) = self.update_own(|job| job.begin_attempt(now)).await.flatten()
            else {
                debug!(job_id = %self.id, "job already terminal, runner exiting");
                return;
            };

            info!(
                job_id = %self.id,
                attempt,
                max_attempts = self.max_attempts,
                fetcher = self.fetcher.name(),
                "starting fetch attempt"
            );
            let _ = self.event_tx.send(Event::AttemptStarted {
                id: self.id.clone(),
                attempt,
            });

            let Some(outcome) = self.fetch_with_progress().await else {
                info!(job_id = %self.id, attempt, "shutdown requested, abandoning fetch");
                return;
            };
            debug!(job_id = %self.id, attempt, outcome = outcome.label(), "fetch attempt finished");

            match outcome {
                FetchOutcome::Success(items) => {
                    self.finish_succeeded(items).await;
                    return;
                }
                FetchOutcome::RateLimited if attempt >= self.max_attempts => {
                    self.finish_failed(format!("rate limited after {} attempts", attempt))
                        .await;
                    return;
                }
                FetchOutcome::RateLimited => {
                    warn!(
                        job_id = %self.id,
                        attempt,
                        retry_in_secs = self.backoff.as_secs(),
                        "rate limited, retrying after backoff"
                    );
                    let _ = self.event_tx.send(Event::RateLimited {
                        id: self.id.clone(),
                        attempt,
                        retry_in_secs: self.backoff.as_secs(),
                    });

                    tokio::select! {
                        _ = tokio::time::sleep(self.backoff) => {}
                        _ = self.cancel.cancelled() => {
                            info!(job_id = %self.id, "shutdown requested during backoff");
                            return;
                        }
                    }
                }
                FetchOutcome::Failure(message) => {
                    self.finish_failed(message).await;
                    return;
                }
            }
        }
    }

    /// Invoke the fetcher while folding its progress into the store
    ///
    /// Returns `None` if shutdown was requested first; dropping the fetch
    /// future kills the external process.
    async fn fetch_with_progress(&self) -> Option<FetchOutcome> {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let fetch = self
            .fetcher
            .fetch(&self.source_url, &self.work_dir, progress_tx);
        tokio::pin!(fetch);

        let outcome = loop {
            tokio::select! {
                outcome = &mut fetch => break outcome,
                Some(update) = progress_rx.recv() => self.record_progress(update).await,
                _ = self.cancel.cancelled() => return None,
            }
        };

        while let Ok(update) = progress_rx.try_recv() {
            self.record_progress(update).await;
        }
        Some(outcome)
    }

    /// Update the job this runner was started for
    ///
    /// A failed job can be replaced under the same key; the replacement has a
    /// different work directory and is left alone.
    async fn update_own<F, R>(&self, mutate: F) -> Option<R>
    where
        F: FnOnce(&mut Job) -> R,
    {
        self.store
            .update(&self.id, |job| {
                (job.work_dir == self.work_dir).then(|| mutate(job))
            })
            .await
            .flatten()
    }

    async fn record_progress(&self, update: ProgressUpdate) {
        let now = Utc::now();
        let changed = self
            .update_own(|job| {
                let before = job.progress();
                job.record_progress(update, now);
                let after = job.progress();
                (before != after).then_some(after)
            })
            .await
            .flatten();

        if let Some(progress) = changed {
            debug!(
                job_id = %self.id,
                completed = progress.completed_items,
                total = progress.total_items,
                "progress"
            );
            let _ = self.event_tx.send(Event::Progress {
                id: self.id.clone(),
                progress,
            });
        }
    }

    async fn finish_succeeded(&self, items: u64) {
        let now = Utc::now();
        let applied = self
            .update_own(|job| job.succeed(items, now))
            .await
            .unwrap_or(false);

        if applied {
            info!(job_id = %self.id, items, "job succeeded");
            let _ = self.event_tx.send(Event::Succeeded {
                id: self.id.clone(),
                items,
            });
        } else {
            warn!(job_id = %self.id, "ignoring success for a job that is already terminal");
        }
    }

    async fn finish_failed(&self, message: String) {
        let now = Utc::now();
        let applied = self
            .update_own(|job| job.fail(message.clone(), now))
            .await
            .unwrap_or(false);

        if applied {
            error!(job_id = %self.id, error = %message, "job failed");
            let _ = self.event_tx.send(Event::Failed {
                id: self.id.clone(),
                error: message,
            });
        } else {
            warn!(job_id = %self.id, error = %message, "ignoring failure for a job that is already terminal");
        }
    }
}
