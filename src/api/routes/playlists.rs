//! Playlist listing handlers.

use super::{AuthStatus, PlaylistsResponse, TracksResponse};
use crate::api::AppState;
use crate::api::auth::{Authenticated, MaybeAuthenticated};
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
};

/// GET /api/playlists - List the user's playlists
#[utoipa::path(
    get,
    path = "/api/playlists",
    tag = "playlists",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Playlists visible to the token's user", body = PlaylistsResponse),
        (status = 401, description = "Not authenticated or token expired", body = crate::error::ApiError),
        (status = 502, description = "Streaming service error", body = crate::error::ApiError)
    )
)]
pub async fn list_playlists(
    State(state): State<AppState>,
    Authenticated(token): Authenticated,
) -> Result<Json<PlaylistsResponse>> {
    let playlists = state.playlists.list_playlists(&token).await?;
    tracing::debug!(count = playlists.len(), "listed playlists");
    Ok(Json(PlaylistsResponse { playlists }))
}

/// GET /api/playlists/:id/tracks - List one playlist's tracks
#[utoipa::path(
    get,
    path = "/api/playlists/{id}/tracks",
    tag = "playlists",
    security(("bearer" = [])),
    params(
        ("id" = String, Path, description = "Playlist id")
    ),
    responses(
        (status = 200, description = "Tracks in playlist order", body = TracksResponse),
        (status = 401, description = "Not authenticated or token expired", body = crate::error::ApiError),
        (status = 502, description = "Streaming service error", body = crate::error::ApiError)
    )
)]
pub async fn list_playlist_tracks(
    State(state): State<AppState>,
    Authenticated(token): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<TracksResponse>> {
    let tracks = state.playlists.list_tracks(&token, &id).await?;
    Ok(Json(TracksResponse { tracks }))
}

/// GET /check_auth - Whether the caller holds a usable token
#[utoipa::path(
    get,
    path = "/check_auth",
    tag = "playlists",
    responses(
        (status = 200, description = "Authentication state", body = AuthStatus)
    )
)]
pub async fn check_auth(MaybeAuthenticated(token): MaybeAuthenticated) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: token.is_some(),
    })
}
