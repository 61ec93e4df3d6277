//! Library usage example: export one playlist without the HTTP layer
//!
//! ```text
//! cargo run --example export_playlist -- 37i9dQZF1DXcBWIGoYBM5M
//! ```
//!
//! Prints lifecycle events as they happen, then the path of the finished zip.

use playlist_export::{Config, Event, JobId, JobManager, JobStatus};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let raw_id = std::env::args()
        .nth(1)
        .ok_or("usage: export_playlist <playlist-id>")?;
    let id = JobId::parse(&raw_id)?;

    let manager = JobManager::new(Config::from_env()?).await?;
    let mut events = manager.subscribe();

    manager.start(id.clone(), None).await?;
    println!("Started export of {id}");

    while let Ok(event) = events.recv().await {
        match event {
            Event::AttemptStarted { id: ref job, attempt } if *job == id => {
                println!("Attempt {attempt}");
            }
            Event::Progress { id: ref job, progress } if *job == id => {
                println!(
                    "Progress: {}/{}",
                    progress.completed_items, progress.total_items
                );
            }
            Event::RateLimited {
                id: ref job,
                retry_in_secs,
                ..
            } if *job == id => {
                println!("Rate limited, retrying in {retry_in_secs}s");
            }
            Event::Succeeded { id: ref job, .. } | Event::Failed { id: ref job, .. }
                if *job == id =>
            {
                break;
            }
            _ => {}
        }
    }

    let status = manager.status(&id).await?;
    println!("{}", status.message);

    if status.status == JobStatus::Succeeded {
        let path = manager.archive(&id).await?;
        println!("Archive: {}", path.display());
    }

    manager.shutdown().await?;
    Ok(())
}
