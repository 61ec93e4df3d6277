//! Utility functions for file operations and text handling

use std::path::{Path, PathBuf};

/// Collect every regular file below `dir`, recursively
///
/// Hidden entries (names starting with `.`) are skipped, including hidden
/// directories, so downloader caches and partial files are never counted.
/// Symlinks are not followed. The result is sorted by path.
///
/// # Examples
///
/// ```no_run
/// use playlist_export::utils::collect_files;
/// use std::path::Path;
///
/// let files = collect_files(Path::new("downloads/p1-x7Kq2a")).unwrap();
/// println!("{} files", files.len());
/// ```
pub fn collect_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            if is_hidden(&entry.file_name()) {
                continue;
            }
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// Whether `path` has one of `extensions` (lowercase, without the dot)
#[must_use]
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| extensions.iter().any(|x| *x == e))
}

/// Keep at most the last `max_bytes` bytes of `text`
///
/// The cut is moved forward to the next character boundary, so the result may
/// be slightly shorter than `max_bytes` but is always valid UTF-8.
///
/// # Examples
///
/// ```
/// use playlist_export::utils::tail_capped;
///
/// assert_eq!(tail_capped("abcdef", 3), "def");
/// assert_eq!(tail_capped("abc", 10), "abc");
/// ```
#[must_use]
pub fn tail_capped(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
