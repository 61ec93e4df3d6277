//! Shared test helpers for creating JobManager instances in tests.

use crate::config::Config;
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::jobs::JobManager;
use crate::types::{JobId, JobStatus, JobView, ProgressUpdate};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedSender;

/// One scripted fetcher invocation
#[derive(Clone, Debug)]
pub(crate) enum Step {
    /// Emit these progress updates, then return the outcome.
    /// `Success(n)` also writes `n` mp3 files into the destination.
    Outcome(Vec<ProgressUpdate>, FetchOutcome),
    /// Never return (until the future is dropped)
    Hang,
}

impl Step {
    pub(crate) fn success(items: u64) -> Self {
        Step::Outcome(vec![], FetchOutcome::Success(items))
    }

    pub(crate) fn rate_limited() -> Self {
        Step::Outcome(vec![], FetchOutcome::RateLimited)
    }

    pub(crate) fn failure(message: &str) -> Self {
        Step::Outcome(vec![], FetchOutcome::Failure(message.to_string()))
    }
}

/// Fetcher that replays a fixed script, one step per call
pub(crate) struct ScriptedFetcher {
    steps: std::sync::Mutex<VecDeque<Step>>,
    calls: AtomicU32,
}

impl ScriptedFetcher {
    pub(crate) fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: std::sync::Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
        })
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _source_url: &str,
        dest_dir: &Path,
        progress: UnboundedSender<ProgressUpdate>,
    ) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            Some(Step::Outcome(updates, outcome)) => {
                for update in updates {
                    let _ = progress.send(update);
                }
                if let FetchOutcome::Success(items) = outcome {
                    for i in 0..items {
                        std::fs::write(dest_dir.join(format!("track-{i:02}.mp3")), b"audio")
                            .unwrap();
                    }
                }
                outcome
            }
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => FetchOutcome::Failure("script exhausted".to_string()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Config rooted in a temp dir with a tiny backoff
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.jobs.work_dir = temp_dir.path().join("downloads");
    config.jobs.archive_dir = temp_dir.path().join("exports");
    config.jobs.backoff = Duration::from_millis(5);
    config
}

/// Helper to create a test JobManager driven by a scripted fetcher.
/// Returns the manager, the fetcher and the tempdir (which must be kept alive).
pub(crate) async fn create_test_manager(
    steps: Vec<Step>,
) -> (JobManager, Arc<ScriptedFetcher>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::new(steps);
    let manager = JobManager::with_fetcher(test_config(&temp_dir), fetcher.clone())
        .await
        .unwrap();
    (manager, fetcher, temp_dir)
}

pub(crate) fn job_id(raw: &str) -> JobId {
    JobId::parse(raw).unwrap()
}

/// Poll the status endpoint until the job is terminal (5 second cap)
pub(crate) async fn wait_for_terminal(manager: &JobManager, id: &JobId) -> JobView {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let view = manager.status(id).await.unwrap();
        if view.completed {
            return view;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} did not finish, last status {:?}",
            view.status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until the job reaches `status`
pub(crate) async fn wait_for_status(manager: &JobManager, id: &JobId, status: JobStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while manager.status(id).await.unwrap().status != status {
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} never reached {status}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
