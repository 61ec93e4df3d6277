//! External track downloader invocation
//!
//! The job runner never talks to a process directly. It goes through the
//! [`Fetcher`] trait, which reports one of three outcomes per run:
//!
//! - [`FetchOutcome::Success`]: the tool exited cleanly and wrote files
//! - [`FetchOutcome::RateLimited`]: the streaming service throttled the tool
//! - [`FetchOutcome::Failure`]: anything else, with a message for the user
//!
//! ## Implementations
//!
//! - [`CliFetcher`]: runs an external binary (`spotdl` by default)
//!
//! Progress is streamed opportunistically through [`parse_progress_line`];
//! output that cannot be parsed is ignored and never fails a run.

mod cli;
mod outcome;
mod progress;
mod traits;

pub use cli::CliFetcher;
pub use outcome::{ExitStatus, MAX_CAPTURED_BYTES, classify_outcome};
pub use progress::parse_progress_line;
pub use traits::{FetchOutcome, Fetcher};
