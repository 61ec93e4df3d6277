//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`downloads`] for export jobs and their archives
//! - [`playlists`] for the streaming-service listings and the auth probe
//! - [`system`] for health, events and the OpenAPI document

use serde::{Deserialize, Serialize};

use crate::playlists::{Playlist, Track};
use crate::types::JobId;

mod downloads;
mod playlists;
mod system;

pub use downloads::*;
pub use playlists::*;
pub use system::*;

/// Response for the start endpoints
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StartDownloadResponse {
    /// Always "started"
    pub status: String,
    /// Job key to poll
    pub id: JobId,
}

impl StartDownloadResponse {
    pub(crate) fn started(id: JobId) -> Self {
        Self {
            status: "started".to_string(),
            id,
        }
    }
}

/// Request body for POST /downloads
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateDownloadRequest {
    /// Playlist URL handed to the downloader
    #[serde(default)]
    pub playlist_url: String,
}

/// Response for GET /api/playlists
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PlaylistsResponse {
    /// Playlists visible to the user
    pub playlists: Vec<Playlist>,
}

/// Response for GET /api/playlists/:id/tracks
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TracksResponse {
    /// Tracks in playlist order
    pub tracks: Vec<Track>,
}

/// Response for GET /check_auth
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AuthStatus {
    /// Whether the request carried a usable token
    pub authenticated: bool,
}
