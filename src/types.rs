//! Core types for playlist-export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Maximum length of a job identifier
pub const MAX_JOB_ID_LEN: usize = 128;

/// Length of server-generated job tokens
const GENERATED_ID_LEN: usize = 16;

/// Unique identifier for a job
///
/// Either a caller-supplied key (usually the playlist id) or a random token.
/// Only ASCII alphanumerics, `-` and `_` are accepted because the id is used to
/// derive the archive file name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Validate and wrap a caller-supplied identifier
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::InvalidJobId {
                id: raw.to_string(),
                reason: "must not be empty".into(),
            });
        }
        if raw.len() > MAX_JOB_ID_LEN {
            return Err(Error::InvalidJobId {
                id: raw.to_string(),
                reason: format!("must be at most {} characters", MAX_JOB_ID_LEN),
            });
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(Error::InvalidJobId {
                id: raw.to_string(),
                reason: format!("unsupported character {:?}", bad),
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// Wrap a key that failed [`JobId::parse`], for echoing it in lookup errors
    ///
    /// Such an id can never name a stored job.
    pub(crate) fn unvalidated(raw: &str) -> Self {
        Self(raw.to_string())
    }

    /// Generate a random alphanumeric token
    pub fn generate() -> Self {
        use rand::Rng;
        use rand::distributions::Alphanumeric;

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_ID_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Job status
///
/// Variants are declared in lifecycle order; `Ord` follows that order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, waiting for the runner task to pick it up
    Pending,
    /// External downloader is running (or backing off between attempts)
    Running,
    /// Tracks fetched, archive can be built
    Succeeded,
    /// Failed permanently; `error` says why
    Failed,
}

impl JobStatus {
    /// Whether no further transitions are allowed
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Lowercase name, as serialized
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort track counters parsed from the downloader's output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Progress {
    /// Number of tracks in the playlist (0 when unknown)
    pub total_items: u64,
    /// Number of tracks written so far
    pub completed_items: u64,
}

/// A single progress observation from one output line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// The tool announced how many tracks it is going to fetch
    Total(u64),
    /// The tool reported an explicit `completed/total` pair
    Counts {
        /// Tracks done
        completed: u64,
        /// Tracks overall
        total: u64,
    },
    /// One more track finished (downloaded or skipped as already present)
    ItemFinished,
}

impl Progress {
    /// Fold an update into the counters
    ///
    /// Counters never move backwards here; a retry that re-announces the total
    /// leaves them where they were. [`Job::begin_attempt`] restarts an
    /// uncapped count.
    pub fn apply(&mut self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::Total(total) => {
                self.total_items = self.total_items.max(total);
            }
            ProgressUpdate::Counts { completed, total } => {
                self.total_items = self.total_items.max(total);
                self.completed_items = self.completed_items.max(completed);
            }
            ProgressUpdate::ItemFinished => {
                self.completed_items += 1;
            }
        }
        if self.total_items > 0 {
            self.completed_items = self.completed_items.min(self.total_items);
        }
    }
}

/// One playlist-export request and its lifecycle record
///
/// All mutation goes through the methods below, which refuse to move a job
/// out of a terminal state and keep `error` set exactly when the job failed.
#[derive(Clone, Debug)]
pub struct Job {
    /// Job key
    pub id: JobId,
    /// URL handed to the external downloader
    pub source_url: String,
    /// Scratch directory owned by this job
    pub work_dir: PathBuf,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job was last mutated
    pub updated_at: DateTime<Utc>,
    status: JobStatus,
    error: Option<String>,
    progress: Progress,
    attempts: u32,
    archive_path: Option<PathBuf>,
}

impl Job {
    /// Create a pending job
    pub fn new(id: JobId, source_url: String, work_dir: PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            id,
            source_url,
            work_dir,
            created_at: now,
            updated_at: now,
            status: JobStatus::Pending,
            error: None,
            progress: Progress::default(),
            attempts: 0,
            archive_path: None,
        }
    }

    /// Current status
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Failure message (only set when failed)
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Progress counters
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Number of fetch attempts consumed
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Cached archive, if one was built
    pub fn archive_path(&self) -> Option<&PathBuf> {
        self.archive_path.as_ref()
    }

    /// Whether the job reached Succeeded or Failed
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Begin a fetch attempt: moves to Running and bumps `attempts`
    ///
    /// Returns the attempt number, or `None` if the job is already terminal.
    /// Without a known total, the per-track count restarts: a retry reports
    /// already-present tracks again.
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) -> Option<u32> {
        if self.is_terminal() {
            return None;
        }
        if self.progress.total_items == 0 {
            self.progress.completed_items = 0;
        }
        self.status = JobStatus::Running;
        self.attempts += 1;
        self.updated_at = now;
        Some(self.attempts)
    }

    /// Seed the expected track count before the first attempt
    pub fn set_expected_items(&mut self, total: u64) {
        if !self.is_terminal() {
            self.progress.apply(ProgressUpdate::Total(total));
        }
    }

    /// Record a progress observation; ignored once terminal
    pub fn record_progress(&mut self, update: ProgressUpdate, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.progress.apply(update);
        self.updated_at = now;
        true
    }

    /// Mark the job succeeded with `items` files written
    pub fn succeed(&mut self, items: u64, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Succeeded;
        self.error = None;
        self.progress.completed_items = items;
        self.progress.total_items = self.progress.total_items.max(items);
        self.updated_at = now;
        true
    }

    /// Mark the job failed with a message
    pub fn fail(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(message.into());
        self.updated_at = now;
        true
    }

    /// Fail a non-terminal job that has outlived `timeout`
    ///
    /// Returns `true` only on the call that performs the transition.
    pub fn expire_if_stale(&mut self, now: DateTime<Utc>, timeout: Duration) -> bool {
        if self.is_terminal() {
            return false;
        }
        let elapsed = now
            .signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or_default();
        if elapsed <= timeout {
            return false;
        }
        self.fail(
            format!("timed out after {} seconds", timeout.as_secs()),
            now,
        )
    }

    /// Remember where the archive was written
    pub fn set_archive_path(&mut self, path: PathBuf) {
        if self.status == JobStatus::Succeeded {
            self.archive_path = Some(path);
        }
    }

    /// Human-readable summary of the current state
    pub fn message(&self) -> String {
        match self.status {
            JobStatus::Pending => "Download queued".to_string(),
            JobStatus::Running if self.progress.total_items > 0 => format!(
                "Downloaded {} of {} tracks",
                self.progress.completed_items, self.progress.total_items
            ),
            JobStatus::Running => "Download in progress".to_string(),
            JobStatus::Succeeded => format!(
                "Download complete ({} tracks)",
                self.progress.completed_items
            ),
            JobStatus::Failed => self
                .error
                .clone()
                .unwrap_or_else(|| "Download failed".to_string()),
        }
    }

    /// Public projection returned by the status endpoint
    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            completed: self.is_terminal(),
            error: self.error.clone(),
            progress: self.progress,
            status: self.status,
            message: self.message(),
            attempts: self.attempts,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Job state as returned by `GET /download-status/:id`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JobView {
    /// Job key
    pub id: JobId,
    /// True once the job reached a terminal state (success or failure)
    pub completed: bool,
    /// Failure message; null unless `status` is `failed`
    pub error: Option<String>,
    /// Track counters
    pub progress: Progress,
    /// Lifecycle status
    pub status: JobStatus,
    /// Human-readable summary
    pub message: String,
    /// Fetch attempts consumed
    pub attempts: u32,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When the job last changed
    pub updated_at: DateTime<Utc>,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job created and scheduled
    Queued {
        /// Job key
        id: JobId,
    },

    /// A fetch attempt started
    AttemptStarted {
        /// Job key
        id: JobId,
        /// Attempt number (1-based)
        attempt: u32,
    },

    /// Progress counters changed
    Progress {
        /// Job key
        id: JobId,
        /// New counters
        progress: Progress,
    },

    /// The downloader hit a rate limit; the runner will retry after a pause
    RateLimited {
        /// Job key
        id: JobId,
        /// Attempt that was rate limited
        attempt: u32,
        /// Seconds until the next attempt
        retry_in_secs: u64,
    },

    /// Job finished successfully
    Succeeded {
        /// Job key
        id: JobId,
        /// Files written
        items: u64,
    },

    /// Job failed permanently
    Failed {
        /// Job key
        id: JobId,
        /// Failure message
        error: String,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
