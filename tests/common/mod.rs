//! Common test utilities for playlist-export integration tests

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use playlist_export::{Config, JobId, JobManager, JobView};
use tempfile::TempDir;

/// Write an executable shell script standing in for the downloader
///
/// The script runs inside the job's work directory, so files it creates there
/// end up in the archive.
pub fn write_fake_downloader(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-spotdl");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Config rooted in `temp_dir` that runs `binary` with no extra arguments
pub fn test_config(temp_dir: &TempDir, binary: PathBuf) -> Config {
    let mut config = Config::default();
    config.jobs.work_dir = temp_dir.path().join("downloads");
    config.jobs.archive_dir = temp_dir.path().join("exports");
    config.jobs.backoff = Duration::from_millis(10);
    config.fetcher.binary_path = Some(binary);
    config.fetcher.install_on_demand = false;
    config.fetcher.extra_args = Vec::new();
    config
}

/// Poll status until the job is terminal (10 second cap)
pub async fn wait_for_terminal(manager: &JobManager, id: &JobId) -> JobView {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let view = manager.status(id).await.unwrap();
        if view.completed {
            return view;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} did not finish: {}",
            view.message
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Entry names of a zip file, sorted
pub fn zip_entries(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}
