//! REST API server module
//!
//! Exposes export jobs, playlist listings and a small system surface over
//! HTTP. Handlers never wait on job work: they record intent with the
//! [`JobManager`] and return.

use crate::playlists::PlaylistSource;
use crate::{Config, JobManager, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Export Jobs
/// - `POST /download/:id` - Start exporting a playlist by id
/// - `POST /downloads` - Start exporting a playlist URL
/// - `GET /download-status/:id` - Poll a job
/// - `GET /download-archive/:id` - Download the finished zip
///
/// ## Playlists
/// - `GET /api/playlists` - List the user's playlists (bearer token)
/// - `GET /api/playlists/:id/tracks` - List a playlist's tracks (bearer token)
/// - `GET /check_auth` - Whether the request carries a usable token
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
/// - `GET /events` - Server-sent events stream
pub fn create_router(
    manager: Arc<JobManager>,
    playlists: Arc<dyn PlaylistSource>,
    config: Arc<Config>,
) -> Router {
    router_with_state(AppState::new(manager, playlists, config))
}

/// Create the API router around a prepared [`AppState`]
pub fn router_with_state(state: AppState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        // Export jobs
        .route("/download/:id", post(routes::start_download))
        .route("/downloads", post(routes::create_download))
        .route("/download-status/:id", get(routes::download_status))
        .route("/download-archive/:id", get(routes::download_archive))
        // Playlists
        .route("/api/playlists", get(routes::list_playlists))
        .route("/api/playlists/:id/tracks", get(routes::list_playlist_tracks))
        .route("/check_auth", get(routes::check_auth))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/swagger-ui/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin. Unparsable origins are dropped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails; see [`start_api_server_with_shutdown`] for a
/// graceful variant.
///
/// # Example
///
/// ```no_run
/// use playlist_export::{Config, JobManager};
/// use playlist_export::playlists::SpotifyClient;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let manager = Arc::new(JobManager::new((*config).clone()).await?);
/// let playlists = Arc::new(SpotifyClient::new(&config.playlists)?);
///
/// playlist_export::api::start_api_server(manager, playlists, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    manager: Arc<JobManager>,
    playlists: Arc<dyn PlaylistSource>,
    config: Arc<Config>,
) -> Result<()> {
    start_api_server_with_shutdown(manager, playlists, config, std::future::pending()).await
}

/// Start the API server and stop accepting connections once `shutdown` resolves.
///
/// In-flight requests are allowed to finish. Jobs are not touched; call
/// [`JobManager::shutdown`] afterwards.
pub async fn start_api_server_with_shutdown<F>(
    manager: Arc<JobManager>,
    playlists: Arc<dyn PlaylistSource>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(manager, playlists, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().map_err(crate::error::Error::Io)?,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
