//! Archive building for finished jobs
//!
//! A succeeded job's work directory is packaged into `<archive_dir>/<id>.zip`.
//! Entries are flattened to their file names, sorted, and stamped with a fixed
//! modification time, so rebuilding from the same directory yields the same
//! membership and the same bytes.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::types::{Job, JobId, JobStatus};
use crate::utils::{collect_files, has_extension};

/// Builds and caches per-job zip archives
#[derive(Clone, Debug)]
pub struct ArchiveBuilder {
    archive_dir: PathBuf,
    audio_extensions: Vec<String>,
}

impl ArchiveBuilder {
    /// Create a builder writing into `archive_dir`
    pub fn new(archive_dir: impl Into<PathBuf>, config: &ArchiveConfig) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            audio_extensions: config
                .audio_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Where the archive for `id` lives
    pub fn archive_path(&self, id: &JobId) -> PathBuf {
        self.archive_dir.join(format!("{}.zip", id))
    }

    /// Build (or rebuild) the archive for a job
    ///
    /// # Errors
    ///
    /// - [`Error::NotReady`] if the job is still pending or running; nothing is written
    /// - [`Error::JobFailed`] with the job's error if it failed
    /// - [`Error::FilesMissing`] if the work directory no longer exists
    /// - [`Error::Io`] / [`Error::Archive`] if writing fails
    pub async fn build(&self, job: &Job) -> Result<PathBuf> {
        match job.status() {
            JobStatus::Pending | JobStatus::Running => {
                return Err(Error::NotReady(job.id.clone()));
            }
            JobStatus::Failed => {
                return Err(Error::JobFailed {
                    id: job.id.clone(),
                    message: job.error().unwrap_or("download failed").to_string(),
                });
            }
            JobStatus::Succeeded => {}
        }

        if !tokio::fs::try_exists(&job.work_dir).await.unwrap_or(false) {
            return Err(Error::FilesMissing {
                id: job.id.clone(),
                path: job.work_dir.clone(),
            });
        }

        tokio::fs::create_dir_all(&self.archive_dir).await?;

        let id = job.id.clone();
        let work_dir = job.work_dir.clone();
        let dest = self.archive_path(&id);
        let audio_extensions = self.audio_extensions.clone();

        let written = dest.clone();
        let count = tokio::task::spawn_blocking(move || -> Result<usize> {
            let files = collect_files(&work_dir)?;
            let entries = select_entries(files, &audio_extensions);
            write_archive(&entries, &written)?;
            Ok(entries.len())
        })
        .await
        .map_err(|e| Error::Other(format!("archive task panicked: {}", e)))??;

        info!(job_id = %id, entries = count, path = %dest.display(), "archive written");
        Ok(dest)
    }
}

/// Choose archive members from the files found in a work directory
///
/// Audio files win when there are any; otherwise everything is kept. Entries
/// are named by file name only and sorted; for duplicate names the first path
/// in sorted order wins.
pub fn select_entries(files: Vec<PathBuf>, audio_extensions: &[String]) -> Vec<(String, PathBuf)> {
    let any_audio = files.iter().any(|f| has_extension(f, audio_extensions));

    let mut entries: Vec<(String, PathBuf)> = files
        .into_iter()
        .filter(|f| !any_audio || has_extension(f, audio_extensions))
        .filter_map(|f| {
            let name = f.file_name()?.to_string_lossy().into_owned();
            Some((name, f))
        })
        .collect();

    // Stable sort keeps the path order among equal names
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut seen = HashSet::new();
    entries.retain(|(name, path)| {
        let fresh = seen.insert(name.clone());
        if !fresh {
            debug!(name = %name, path = %path.display(), "skipping duplicate archive entry");
        }
        fresh
    });
    entries
}

/// Write `entries` to `dest` through a temporary file and an atomic rename
fn write_archive(entries: &[(String, PathBuf)], dest: &Path) -> Result<()> {
    let tmp = temp_path(dest);
    let result = write_zip(entries, &tmp).and_then(|()| {
        std::fs::rename(&tmp, dest)?;
        Ok(())
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn write_zip(entries: &[(String, PathBuf)], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    for (name, source) in entries {
        zip.start_file(name.as_str(), options)?;
        let mut input = File::open(source)?;
        std::io::copy(&mut input, &mut zip)?;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(())
}

fn temp_path(dest: &Path) -> PathBuf {
    use rand::Rng;

    let suffix: u32 = rand::thread_rng().r#gen();
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive.zip".to_string());
    dest.with_file_name(format!(".{}.{:08x}.tmp", name, suffix))
}
