//! Download job lifecycle
//!
//! The [`JobManager`] is the only entry point the HTTP layer uses. It is split into:
//! - [`store`] - In-memory job records with atomic create/get/update
//! - [`runner`] - The per-job retry loop that drives the fetcher
//!
//! Starting a job returns immediately; the runner task does all the work in the
//! background. Status reads apply the lazy timeout, and archive requests build
//! (or reuse) the job's zip file.

mod runner;
mod store;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use store::JobStore;

use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use crate::archive::ArchiveBuilder;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{CliFetcher, Fetcher};
use crate::types::{Event, Job, JobId, JobView};
use runner::JobRunner;

/// Length of the random suffix on work directory names
const WORK_DIR_SUFFIX_LEN: usize = 6;

/// How long shutdown waits for runner tasks to exit
const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Job manager (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct JobManager {
    /// Job records
    pub(crate) store: JobStore,
    /// External downloader
    fetcher: Arc<dyn Fetcher>,
    /// Archive builder for finished jobs
    archive: ArchiveBuilder,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Configuration
    config: Arc<Config>,
    /// Parent of every runner's cancellation token
    shutdown_token: CancellationToken,
    /// Runner tasks still alive, keyed by work directory (unique per job record)
    active_runners: Arc<Mutex<HashMap<PathBuf, CancellationToken>>>,
    /// Cleared once shutdown starts
    accepting_new: Arc<AtomicBool>,
}

impl JobManager {
    /// Create a manager using the external CLI downloader from `config.fetcher`
    pub async fn new(config: Config) -> Result<Self> {
        let fetcher = Arc::new(CliFetcher::new(config.fetcher.clone()));
        Self::with_fetcher(config, fetcher).await
    }

    /// Create a manager with a custom fetcher implementation
    pub async fn with_fetcher(config: Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.jobs.work_dir).await?;
        tokio::fs::create_dir_all(&config.jobs.archive_dir).await?;

        let archive = ArchiveBuilder::new(config.jobs.archive_dir.clone(), &config.archive);
        let (event_tx, _rx) = broadcast::channel(1000);

        tracing::info!(
            work_dir = %config.jobs.work_dir.display(),
            archive_dir = %config.jobs.archive_dir.display(),
            max_attempts = config.jobs.max_attempts,
            fetcher = fetcher.name(),
            "job manager ready"
        );

        Ok(Self {
            store: JobStore::new(),
            fetcher,
            archive,
            event_tx,
            config: Arc::new(config),
            shutdown_token: CancellationToken::new(),
            active_runners: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Start exporting the playlist identified by `id`
    ///
    /// The source URL is derived from `jobs.source_url_template`. If
    /// `expected_items` is known (e.g. from the playlist source) it seeds the
    /// progress total. Returns as soon as the job is recorded.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] if a live or succeeded job exists under `id`,
    /// [`Error::ShuttingDown`] once shutdown has begun.
    pub async fn start(&self, id: JobId, expected_items: Option<u64>) -> Result<JobView> {
        let source_url = self
            .config
            .jobs
            .source_url_template
            .replace("{id}", id.as_str());
        self.launch(id, source_url, expected_items).await
    }

    /// Start exporting an arbitrary playlist URL under a generated id
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] unless `source_url` is an absolute http(s) URL.
    pub async fn start_url(&self, source_url: &str) -> Result<JobView> {
        let parsed = url::Url::parse(source_url.trim())
            .map_err(|e| Error::Validation(format!("invalid playlist_url: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Validation(format!(
                "unsupported playlist_url scheme: {}",
                parsed.scheme()
            )));
        }
        self.launch(JobId::generate(), parsed.to_string(), None).await
    }

    async fn launch(
        &self,
        id: JobId,
        source_url: String,
        expected_items: Option<u64>,
    ) -> Result<JobView> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let work_dir = self.allocate_work_dir(&id).await?;
        let mut job = Job::new(id.clone(), source_url.clone(), work_dir.clone(), Utc::now());
        if let Some(total) = expected_items {
            job.set_expected_items(total);
        }

        let job = match self.store.create(job).await {
            Ok(job) => job,
            Err(e) => {
                let _ = tokio::fs::remove_dir(&work_dir).await;
                return Err(e);
            }
        };

        tracing::info!(job_id = %id, source_url = %source_url, work_dir = %work_dir.display(), "job queued");
        let _ = self.event_tx.send(Event::Queued { id: id.clone() });

        self.spawn_runner(&job).await;
        Ok(job.view())
    }

    /// Create `<work_root>/<id>-<suffix>`, never reusing an existing directory
    async fn allocate_work_dir(&self, id: &JobId) -> Result<PathBuf> {
        use rand::Rng;
        use rand::distributions::Alphanumeric;

        loop {
            let suffix: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(WORK_DIR_SUFFIX_LEN)
                .map(char::from)
                .collect();
            let dir = self.config.jobs.work_dir.join(format!("{}-{}", id, suffix));
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn spawn_runner(&self, job: &Job) {
        let cancel = self.shutdown_token.child_token();
        self.active_runners
            .lock()
            .await
            .insert(job.work_dir.clone(), cancel.clone());

        let runner = JobRunner {
            id: job.id.clone(),
            source_url: job.source_url.clone(),
            work_dir: job.work_dir.clone(),
            store: self.store.clone(),
            fetcher: self.fetcher.clone(),
            event_tx: self.event_tx.clone(),
            max_attempts: self.config.jobs.max_attempts,
            backoff: self.config.jobs.backoff,
            cancel,
        };
        let active_runners = self.active_runners.clone();
        let work_dir = job.work_dir.clone();

        tokio::spawn(async move {
            runner.run().await;
            active_runners.lock().await.remove(&work_dir);
        });
    }

    /// Raise the expected track count of a live job
    ///
    /// Used when the playlist size becomes known after the job started.
    /// Returns `false` for unknown or terminal jobs.
    pub async fn seed_expected_items(&self, id: &JobId, total: u64) -> bool {
        let progress = self
            .store
            .update(id, |job| {
                if job.is_terminal() {
                    return None;
                }
                job.set_expected_items(total);
                Some(job.progress())
            })
            .await
            .flatten();

        match progress {
            Some(progress) => {
                tracing::debug!(job_id = %id, total, "seeded expected track count");
                let _ = self.event_tx.send(Event::Progress {
                    id: id.clone(),
                    progress,
                });
                true
            }
            None => false,
        }
    }

    /// Current state of a job
    ///
    /// A non-terminal job older than `jobs.timeout`, or whose work directory has
    /// vanished, is failed here. Both checks are idempotent.
    pub async fn status(&self, id: &JobId) -> Result<JobView> {
        let snapshot = self
            .store
            .get(id)
            .await
            .ok_or_else(|| Error::JobNotFound(id.clone()))?;

        if snapshot.is_terminal() {
            return Ok(snapshot.view());
        }

        let dir_missing = !tokio::fs::try_exists(&snapshot.work_dir)
            .await
            .unwrap_or(false);
        let timeout = self.config.jobs.timeout;
        let now = Utc::now();

        let (view, failed) = self
            .store
            .update(id, |job| {
                let transitioned = job.expire_if_stale(now, timeout)
                    || (dir_missing && job.fail("work directory is no longer available", now));
                (job.view(), transitioned)
            })
            .await
            .ok_or_else(|| Error::JobNotFound(id.clone()))?;

        if failed {
            // The runner can no longer change the job; stop its process
            if let Some(token) = self.active_runners.lock().await.get(&snapshot.work_dir) {
                token.cancel();
            }
            let error = view.error.clone().unwrap_or_default();
            tracing::warn!(job_id = %id, error = %error, "job failed on status check");
            let _ = self.event_tx.send(Event::Failed {
                id: id.clone(),
                error,
            });
        }
        Ok(view)
    }

    /// Path to the job's archive, building it if needed
    ///
    /// # Errors
    ///
    /// [`Error::JobNotFound`], [`Error::NotReady`], [`Error::JobFailed`] or
    /// [`Error::FilesMissing`]; see [`ArchiveBuilder::build`].
    pub async fn archive(&self, id: &JobId) -> Result<PathBuf> {
        // Run the lazy checks first so a stale job reports its timeout
        self.status(id).await?;

        let job = self
            .store
            .get(id)
            .await
            .ok_or_else(|| Error::JobNotFound(id.clone()))?;

        if let Some(cached) = job.archive_path()
            && tokio::fs::try_exists(cached).await.unwrap_or(false)
        {
            tracing::debug!(job_id = %id, path = %cached.display(), "serving cached archive");
            return Ok(cached.clone());
        }

        let path = self.archive.build(&job).await?;
        self.store
            .update(id, |job| job.set_archive_path(path.clone()))
            .await;
        Ok(path)
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of jobs known to the store
    pub async fn job_count(&self) -> usize {
        self.store.len().await
    }

    /// Number of jobs not yet terminal
    pub async fn active_count(&self) -> usize {
        self.store.active_count().await
    }

    /// Whether new jobs are still accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }

    /// Gracefully shut down
    ///
    /// 1. Stops accepting new jobs
    /// 2. Cancels every runner (fetches are killed, backoffs interrupted)
    /// 3. Waits up to 30 seconds for runner tasks to exit
    ///
    /// Interrupted jobs keep their last non-terminal state.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        self.shutdown_token.cancel();
        tracing::debug!(
            active_runners = self.active_runners.lock().await.len(),
            "Signaled cancellation to all runners"
        );

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_runners()).await {
            Ok(()) => tracing::info!("All runners stopped"),
            Err(_) => {
                tracing::warn!("Timeout waiting for runners to stop, proceeding with shutdown")
            }
        }

        let _ = self.event_tx.send(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_runners(&self) {
        loop {
            let active = self.active_runners.lock().await.len();
            if active == 0 {
                return;
            }
            tracing::debug!(active, "Waiting for runners to stop");
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }
}
