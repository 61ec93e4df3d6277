//! REST API server example
//!
//! Runs the export service with settings from the environment (and `.env`).
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:8000/swagger-ui
//! - Start an export via POST http://localhost:8000/download/<playlist-id>
//! - Poll it via GET http://localhost:8000/download-status/<playlist-id>
//! - Fetch the zip via GET http://localhost:8000/download-archive/<playlist-id>
//! - Stream events via GET http://localhost:8000/events
//!
//! Set `RUST_LOG=playlist_export=debug` for more detail.

use std::sync::Arc;

use playlist_export::api::start_api_server_with_shutdown;
use playlist_export::{Config, JobManager, SpotifyClient, wait_for_signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("playlist_export=info,tower_http=info")),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    let manager = Arc::new(JobManager::new((*config).clone()).await?);
    let playlists = Arc::new(SpotifyClient::new(&config.playlists)?);

    let address = config.api.bind_address;
    println!("Starting playlist-export REST API server");
    println!("Swagger UI: http://{address}/swagger-ui");
    println!("Events stream: http://{address}/events");
    println!();
    println!("Example commands:");
    println!("  curl -X POST http://{address}/download/37i9dQZF1DXcBWIGoYBM5M");
    println!("  curl http://{address}/download-status/37i9dQZF1DXcBWIGoYBM5M");
    println!("  curl -OJ http://{address}/download-archive/37i9dQZF1DXcBWIGoYBM5M");

    start_api_server_with_shutdown(manager.clone(), playlists, config, wait_for_signal()).await?;

    manager.shutdown().await?;
    println!("Shutdown complete");
    Ok(())
}
