//! Traits and types for invoking the external track downloader

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;

use crate::types::ProgressUpdate;

/// Classified result of one downloader run
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The tool exited cleanly and wrote this many files
    Success(u64),
    /// The tool failed because the streaming service throttled it
    RateLimited,
    /// The tool failed for any other reason; the message is surfaced verbatim
    Failure(String),
}

impl FetchOutcome {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::RateLimited => "rate_limited",
            FetchOutcome::Failure(_) => "failure",
        }
    }
}

/// Trait for fetching a playlist's tracks into a directory
///
/// Implementations must only write inside `dest_dir`. Progress observations are
/// best-effort; a closed `progress` channel must not affect the outcome.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch every track of `source_url` into `dest_dir`
    async fn fetch(
        &self,
        source_url: &str,
        dest_dir: &Path,
        progress: UnboundedSender<ProgressUpdate>,
    ) -> FetchOutcome;

    /// Get the name of this implementation
    fn name(&self) -> &'static str;
}
