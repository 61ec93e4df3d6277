//! Classification of a finished downloader run

use super::traits::FetchOutcome;
use crate::utils::tail_capped;

/// Maximum bytes of captured output kept for failure messages
pub const MAX_CAPTURED_BYTES: usize = 8 * 1024;

/// Exit status of an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The command exited successfully (exit code 0)
    Success,
    /// The command exited with a non-zero exit code (or was killed)
    Failure,
}

impl ExitStatus {
    /// Returns `true` if the exit status represents success
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<bool> for ExitStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// Turn a finished run into a [`FetchOutcome`]
///
/// Pure function of its inputs:
/// - failed exit and `captured` contains any of `markers` (case-insensitive) => `RateLimited`
/// - failed exit otherwise => `Failure` carrying the tail of `captured`
/// - clean exit with `files_in_dest == 0` => `Failure("no files produced")`
/// - clean exit otherwise => `Success(files_in_dest)`
///
/// A clean exit is never treated as rate limited, even if the output mentions it:
/// the tool retries internally and may recover.
pub fn classify_outcome(
    exit_status: ExitStatus,
    captured: &str,
    files_in_dest: u64,
    markers: &[String],
) -> FetchOutcome {
    if exit_status.is_success() {
        return if files_in_dest == 0 {
            FetchOutcome::Failure("no files produced".to_string())
        } else {
            FetchOutcome::Success(files_in_dest)
        };
    }

    let lower = captured.to_lowercase();
    if markers
        .iter()
        .filter(|m| !m.is_empty())
        .any(|m| lower.contains(&m.to_lowercase()))
    {
        return FetchOutcome::RateLimited;
    }

    let message = tail_capped(captured.trim(), MAX_CAPTURED_BYTES).trim();
    if message.is_empty() {
        FetchOutcome::Failure("downloader exited with an error and no output".to_string())
    } else {
        FetchOutcome::Failure(message.to_string())
    }
}
