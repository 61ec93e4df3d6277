//! Export job handlers.

use super::{CreateDownloadRequest, StartDownloadResponse};
use crate::api::AppState;
use crate::api::auth::MaybeAuthenticated;
use crate::error::{Error, Result};
use crate::types::{JobId, JobView};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

/// POST /download/:id - Start exporting a playlist
#[utoipa::path(
    post,
    path = "/download/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Playlist id, used as the job key")
    ),
    responses(
        (status = 202, description = "Export started", body = StartDownloadResponse),
        (status = 400, description = "Invalid job id", body = crate::error::ApiError),
        (status = 409, description = "A live or finished job already exists", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_download(
    State(state): State<AppState>,
    MaybeAuthenticated(token): MaybeAuthenticated,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<StartDownloadResponse>)> {
    let id = JobId::parse(&id)?;
    let view = state.manager.start(id, None).await?;

    // Track count is only cosmetic; a listing failure never affects the job
    if let Some(token) = token {
        let manager = state.manager.clone();
        let playlists = state.playlists.clone();
        let id = view.id.clone();
        tokio::spawn(async move {
            match playlists.list_tracks(&token, id.as_str()).await {
                Ok(tracks) => {
                    manager.seed_expected_items(&id, tracks.len() as u64).await;
                }
                Err(e) => {
                    tracing::debug!(job_id = %id, error = %e, "could not list playlist tracks");
                }
            }
        });
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(StartDownloadResponse::started(view.id)),
    ))
}

/// POST /downloads - Start exporting an arbitrary playlist URL
#[utoipa::path(
    post,
    path = "/downloads",
    tag = "downloads",
    request_body = CreateDownloadRequest,
    responses(
        (status = 202, description = "Export started", body = StartDownloadResponse),
        (status = 400, description = "Missing or invalid playlist_url", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn create_download(
    State(state): State<AppState>,
    Json(request): Json<CreateDownloadRequest>,
) -> Result<(StatusCode, Json<StartDownloadResponse>)> {
    let view = state.manager.start_url(&request.playlist_url).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartDownloadResponse::started(view.id)),
    ))
}

/// GET /download-status/:id - Poll a job
#[utoipa::path(
    get,
    path = "/download-status/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Job key")
    ),
    responses(
        (status = 200, description = "Current job state", body = JobView),
        (status = 404, description = "Unknown job", body = crate::error::ApiError)
    )
)]
pub async fn download_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>> {
    let id = lookup_id(&id)?;
    Ok(Json(state.manager.status(&id).await?))
}

/// GET /download-archive/:id - Download the finished archive
#[utoipa::path(
    get,
    path = "/download-archive/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Job key")
    ),
    responses(
        (status = 200, description = "Zip archive of the exported tracks", content_type = "application/zip"),
        (status = 400, description = "Job not finished yet", body = crate::error::ApiError),
        (status = 404, description = "Unknown job", body = crate::error::ApiError),
        (status = 500, description = "Job failed or its files are gone", body = crate::error::ApiError)
    )
)]
pub async fn download_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = lookup_id(&id)?;
    let path = state.manager.archive(&id).await?;

    let file = tokio::fs::File::open(&path).await?;
    let length = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    tracing::info!(job_id = %id, path = %path.display(), bytes = length, "serving archive");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.zip\"", id),
            ),
        ],
        body,
    )
        .into_response())
}

/// Parse an id on the read endpoints; a malformed id is just an unknown one
fn lookup_id(raw: &str) -> Result<JobId> {
    JobId::parse(raw).map_err(|_| Error::JobNotFound(JobId::unvalidated(raw)))
}
