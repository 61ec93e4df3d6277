//! CLI-based fetcher using an external downloader binary (spotdl by default)

use super::outcome::{ExitStatus, MAX_CAPTURED_BYTES, classify_outcome};
use super::progress::parse_progress_line;
use super::traits::{FetchOutcome, Fetcher};
use crate::config::{FetcherConfig, env_keys};
use crate::error::{Error, Result};
use crate::types::ProgressUpdate;
use crate::utils::{collect_files, tail_capped};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, trace, warn};

/// CLI-based fetcher
///
/// Runs `<binary> <playlist-url> --output <dest_dir> <extra args...>` with
/// `dest_dir` as the working directory, streams stdout and stderr line by line
/// into the progress parser, and classifies the run with [`classify_outcome`].
///
/// # Examples
///
/// ```no_run
/// use playlist_export::config::FetcherConfig;
/// use playlist_export::fetcher::{CliFetcher, Fetcher};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let fetcher = CliFetcher::new(FetcherConfig::default());
/// let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
/// let outcome = fetcher
///     .fetch(
///         "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
///         Path::new("downloads/p1"),
///         tx,
///     )
///     .await;
/// println!("{}", outcome.label());
/// # }
/// ```
pub struct CliFetcher {
    config: FetcherConfig,
    /// Set once the install command has been tried; held while installing
    install_attempted: Mutex<bool>,
}

impl CliFetcher {
    /// Create a fetcher from configuration
    pub fn new(config: FetcherConfig) -> Self {
        Self {
            config,
            install_attempted: Mutex::new(false),
        }
    }

    /// Create a fetcher for an explicit binary, without install-on-demand
    pub fn with_binary(binary_path: PathBuf) -> Self {
        Self::new(FetcherConfig {
            binary_path: Some(binary_path),
            install_on_demand: false,
            ..FetcherConfig::default()
        })
    }

    /// Locate the downloader binary
    ///
    /// Explicit `binary_path` wins, then a PATH lookup. If both fail and
    /// install-on-demand is enabled, the install command runs once per fetcher
    /// and the lookup is repeated.
    async fn resolve_binary(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config.binary_path {
            return Some(path.clone());
        }
        if let Ok(path) = which::which(&self.config.binary_name) {
            return Some(path);
        }
        if !self.config.install_on_demand || self.config.install_command.is_empty() {
            return None;
        }

        let mut attempted = self.install_attempted.lock().await;
        if !*attempted {
            *attempted = true;
            self.install().await;
        }
        which::which(&self.config.binary_name).ok()
    }

    /// Resolve the binary and start it on `source_url`
    async fn spawn_downloader(&self, source_url: &str, dest_dir: &Path) -> Result<Child> {
        let binary = self.resolve_binary().await.ok_or_else(|| {
            Error::ExternalTool(format!(
                "{} is not available; install it or set {}",
                self.config.binary_name,
                env_keys::FETCHER_PATH
            ))
        })?;

        debug!(binary = %binary.display(), source_url, dest_dir = %dest_dir.display(), "starting downloader");

        Command::new(&binary)
            .arg(source_url)
            .arg("--output")
            .arg(dest_dir)
            .args(&self.config.extra_args)
            .current_dir(dest_dir)
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::ExternalTool(format!("failed to execute {}: {}", binary.display(), e))
            })
    }

    async fn install(&self) {
        let Some((program, args)) = self.config.install_command.split_first() else {
            return;
        };
        let command = self.config.install_command.join(" ");
        info!(binary = %self.config.binary_name, command = %command, "downloader not found, installing");

        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                info!(binary = %self.config.binary_name, "downloader installed");
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    command = %command,
                    stderr = %tail_capped(stderr.trim(), 1024),
                    "downloader install command failed"
                );
            }
            Err(e) => {
                warn!(command = %command, error = %e, "failed to run downloader install command");
            }
        }
    }
}

#[async_trait]
impl Fetcher for CliFetcher {
    async fn fetch(
        &self,
        source_url: &str,
        dest_dir: &Path,
        progress: mpsc::UnboundedSender<ProgressUpdate>,
    ) -> FetchOutcome {
        let mut child = match self.spawn_downloader(source_url, dest_dir).await {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "could not start downloader");
                return FetchOutcome::Failure(e.to_string());
            }
        };

        let (line_tx, mut line_rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        let mut captured = String::new();
        while let Some(line) = line_rx.recv().await {
            trace!(line = %line, "downloader output");
            if let Some(update) = parse_progress_line(&line) {
                // The receiver may be gone; progress is best-effort
                let _ = progress.send(update);
            }
            captured.push_str(&line);
            captured.push('\n');
            if captured.len() > MAX_CAPTURED_BYTES * 2 {
                captured = tail_capped(&captured, MAX_CAPTURED_BYTES).to_string();
            }
        }

        let exit_status = match child.wait().await {
            Ok(status) => ExitStatus::from(status.success()),
            Err(e) => {
                return FetchOutcome::Failure(format!("failed to wait for downloader: {}", e));
            }
        };

        let dir = dest_dir.to_path_buf();
        let files_in_dest = match tokio::task::spawn_blocking(move || collect_files(&dir)).await {
            Ok(Ok(files)) => files.len() as u64,
            Ok(Err(e)) => {
                warn!(dest_dir = %dest_dir.display(), error = %e, "failed to list downloaded files");
                0
            }
            Err(e) => {
                warn!(error = %e, "file listing task panicked");
                0
            }
        };

        classify_outcome(
            exit_status,
            &captured,
            files_in_dest,
            &self.config.rate_limit_markers,
        )
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}

/// Forward lines from a child pipe until EOF or until the receiver is gone
///
/// Invalid UTF-8 is replaced rather than ending the stream.
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write an executable shell script standing in for the downloader
    fn fake_downloader(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-spotdl");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn run(fetcher: &CliFetcher, dest: &Path) -> (FetchOutcome, Vec<ProgressUpdate>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcome = fetcher
            .fetch("https://open.spotify.com/playlist/p1", dest, tx)
            .await;
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        (outcome, updates)
    }

    #[tokio::test]
    async fn successful_run_counts_files_and_reports_progress() {
        let bin_dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let script = fake_downloader(
            &bin_dir,
            r#"echo "Found 2 songs in Road Trip (Playlist)"
touch "A - One.mp3"
echo 'Downloaded "A - One": https://example.com/1'
touch "B - Two.mp3"
echo 'Downloaded "B - Two": https://example.com/2' >&2
exit 0"#,
        );

        let (outcome, updates) = run(&CliFetcher::with_binary(script), dest.path()).await;

        assert_eq!(outcome, FetchOutcome::Success(2));
        assert!(updates.contains(&ProgressUpdate::Total(2)));
        assert_eq!(
            updates
                .iter()
                .filter(|u| **u == ProgressUpdate::ItemFinished)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn arguments_include_url_and_output_directory() {
        let bin_dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let script = fake_downloader(&bin_dir, r#"printf '%s\n' "$@" > args.txt"#);

        let (outcome, _) = run(&CliFetcher::with_binary(script), dest.path()).await;
        assert_eq!(outcome, FetchOutcome::Success(1));

        let args = std::fs::read_to_string(dest.path().join("args.txt")).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(args[0], "https://open.spotify.com/playlist/p1");
        assert_eq!(args[1], "--output");
        assert_eq!(args[2], dest.path().to_str().unwrap());
        assert_eq!(&args[3..], ["--bitrate", "192k"]);
    }

    #[tokio::test]
    async fn rate_limit_message_on_stderr_is_detected() {
        let bin_dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let script = fake_downloader(
            &bin_dir,
            "echo 'Your application has reached a rate/request limit.' >&2\nexit 1",
        );

        let (outcome, _) = run(&CliFetcher::with_binary(script), dest.path()).await;
        assert_eq!(outcome, FetchOutcome::RateLimited);
    }

    #[tokio::test]
    async fn other_failures_carry_the_output() {
        let bin_dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let script = fake_downloader(&bin_dir, "echo 'playlist is private' >&2\nexit 2");

        let (outcome, _) = run(&CliFetcher::with_binary(script), dest.path()).await;
        assert_eq!(outcome, FetchOutcome::Failure("playlist is private".into()));
    }

    #[tokio::test]
    async fn clean_exit_without_files_fails() {
        let bin_dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let script = fake_downloader(&bin_dir, "echo 'Found 0 songs'\nexit 0");

        let (outcome, _) = run(&CliFetcher::with_binary(script), dest.path()).await;
        assert_eq!(outcome, FetchOutcome::Failure("no files produced".into()));
    }

    #[tokio::test]
    async fn missing_explicit_binary_is_a_failure_not_a_panic() {
        let dest = TempDir::new().unwrap();
        let fetcher = CliFetcher::with_binary(PathBuf::from("/nonexistent/spotdl-xyz"));

        let (outcome, _) = run(&fetcher, dest.path()).await;
        match outcome {
            FetchOutcome::Failure(msg) => assert!(msg.contains("failed to execute")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn launch_problems_are_external_tool_errors() {
        let dest = TempDir::new().unwrap();
        let fetcher = CliFetcher::new(FetcherConfig {
            binary_name: "nonexistent-downloader-binary-xyz".into(),
            install_on_demand: false,
            ..FetcherConfig::default()
        });
        let err = fetcher
            .spawn_downloader("https://open.spotify.com/playlist/p1", dest.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool(ref msg) if msg.contains("not available")));

        let fetcher = CliFetcher::with_binary(PathBuf::from("/nonexistent/spotdl-xyz"));
        let err = fetcher
            .spawn_downloader("https://open.spotify.com/playlist/p1", dest.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool(ref msg) if msg.contains("failed to execute")));
    }

    #[tokio::test]
    async fn unresolvable_binary_reports_not_available() {
        let dest = TempDir::new().unwrap();
        let fetcher = CliFetcher::new(FetcherConfig {
            binary_name: "nonexistent-downloader-binary-xyz".into(),
            install_on_demand: false,
            ..FetcherConfig::default()
        });

        let (outcome, _) = run(&fetcher, dest.path()).await;
        match outcome {
            FetchOutcome::Failure(msg) => assert!(msg.contains("not available")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_install_is_attempted_once_and_never_succeeds() {
        let bin_dir = TempDir::new().unwrap();
        let marker = bin_dir.path().join("install-runs");
        let installer = bin_dir.path().join("installer");
        std::fs::write(
            &installer,
            format!("#!/bin/sh\necho run >> '{}'\nexit 1\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&installer, std::fs::Permissions::from_mode(0o755)).unwrap();

        let dest = TempDir::new().unwrap();
        let fetcher = CliFetcher::new(FetcherConfig {
            binary_name: "nonexistent-downloader-binary-xyz".into(),
            install_on_demand: true,
            install_command: vec![installer.to_string_lossy().into_owned()],
            ..FetcherConfig::default()
        });

        for _ in 0..2 {
            let (outcome, _) = run(&fetcher, dest.path()).await;
            assert!(matches!(outcome, FetchOutcome::Failure(ref msg) if msg.contains("not available")));
        }
        let runs = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(runs.lines().count(), 1);
    }
}
