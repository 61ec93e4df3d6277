//! # playlist-export
//!
//! Backend library for exporting streaming-service playlists as zip archives.
//!
//! A caller starts an export job for a playlist; a background task drives an
//! external downloader (spotdl by default), retrying with a fixed pause when the
//! service rate-limits it. Callers poll the job's status and, once it has
//! succeeded, fetch a zip of the downloaded tracks. Starting a job never waits
//! for the download.
//!
//! ## Quick Start
//!
//! ```no_run
//! use playlist_export::{Config, JobManager, JobId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = JobManager::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let id = JobId::parse("37i9dQZF1DXcBWIGoYBM5M")?;
//!     manager.start(id.clone(), None).await?;
//!
//!     let status = manager.status(&id).await?;
//!     println!("{}", status.message);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Zip packaging of finished jobs
pub mod archive;
/// Access tokens for the playlist source
pub mod auth;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// External downloader invocation
pub mod fetcher;
/// Job lifecycle: store, runner and manager
pub mod jobs;
/// Streaming-service Web API client
pub mod playlists;
/// Core types and events
pub mod types;
/// Filesystem helpers
pub mod utils;

// Re-export commonly used types
pub use archive::ArchiveBuilder;
pub use auth::{AccessToken, AuthAdapter, NoToken, StaticToken};
pub use config::Config;
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use fetcher::{CliFetcher, FetchOutcome, Fetcher};
pub use jobs::{JobManager, JobStore};
pub use playlists::{Playlist, PlaylistSource, SpotifyClient, Track};
pub use types::{Event, Job, JobId, JobStatus, JobView, Progress, ProgressUpdate};

/// Run until a termination signal arrives, then shut the manager down gracefully.
///
/// This is a convenience function that:
/// 1. Waits for SIGTERM or SIGINT (Ctrl+C)
/// 2. Calls [`JobManager::shutdown`], which stops new jobs and waits for
///    running ones to wind down
///
/// # Example
///
/// ```no_run
/// use playlist_export::{Config, JobManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = JobManager::new(Config::default()).await?;
///     run_with_shutdown(&manager).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: &JobManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await
}

/// Resolve once SIGTERM or SIGINT is received
///
/// Suitable as the shutdown future of
/// [`api::start_api_server_with_shutdown`].
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

/// Resolve once Ctrl+C is received
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
