//! Best-effort progress parsing for downloader output
//!
//! Recognized lines (spotdl wording, ANSI colours stripped):
//! - `Found 12 songs in Road Trip (Playlist)` announces the total
//! - `Downloaded "Artist - Title": https://...` finishes one track
//! - `Skipping Artist - Title (file already exists)` also finishes one track
//! - `3/12 complete` carries both counters
//!
//! Anything else yields `None`.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::ProgressUpdate;

// Patterns are literals, so compilation cannot fail at runtime.
#[allow(clippy::expect_used)]
fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("progress pattern is valid")
}

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| pattern(r"\x1b\[[0-9;?]*[A-Za-z]"));

static FOUND_TOTAL: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)\bfound\s+(\d+)\s+(?:songs?|tracks?)\b"));

static COUNTS: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(\d+)\s*/\s*(\d+)\s+(?:complete|completed|downloaded|done)\b")
});

static ITEM_FINISHED: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#"(?i)^\s*(?:downloaded\s+"|skipping\s+\S)"#));

/// Parse one output line into a progress observation
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let line = ANSI_ESCAPE.replace_all(line, "");

    if let Some(caps) = COUNTS.captures(&line) {
        let completed: u64 = caps[1].parse().ok()?;
        let total: u64 = caps[2].parse().ok()?;
        if total == 0 || completed > total {
            return None;
        }
        return Some(ProgressUpdate::Counts { completed, total });
    }

    if let Some(caps) = FOUND_TOTAL.captures(&line) {
        let total: u64 = caps[1].parse().ok()?;
        return Some(ProgressUpdate::Total(total));
    }

    if ITEM_FINISHED.is_match(&line) {
        return Some(ProgressUpdate::ItemFinished);
    }

    None
}
