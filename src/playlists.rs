//! Playlist source backed by the streaming service's Web API
//!
//! Lists the caller's playlists and a playlist's tracks, following the
//! API's `next` links until every page has been read.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::AccessToken;
use crate::config::PlaylistSourceConfig;
use crate::error::{Error, Result};

/// Upper bound on pages followed for one listing
const MAX_PAGES: usize = 1000;

/// A playlist owned or followed by the user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Playlist {
    /// Playlist id (usable as a job key)
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: Option<String>,
    /// Owner's display name
    pub owner: Option<String>,
    /// Number of tracks
    pub track_count: u64,
    /// Cover image URL
    pub image_url: Option<String>,
    /// Public web URL
    pub url: Option<String>,
}

/// A track within a playlist
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Track {
    /// Track id (absent for local files)
    pub id: Option<String>,
    /// Track title
    pub name: String,
    /// Artist names, in credit order
    pub artists: Vec<String>,
    /// Album title
    pub album: Option<String>,
    /// Length in milliseconds
    pub duration_ms: u64,
}

/// Trait for listing playlists and their tracks
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Every playlist visible to the token's user
    async fn list_playlists(&self, token: &AccessToken) -> Result<Vec<Playlist>>;

    /// Every track of `playlist_id`; removed or unavailable entries are skipped
    async fn list_tracks(&self, token: &AccessToken, playlist_id: &str) -> Result<Vec<Track>>;
}

/// Web API client
///
/// # Examples
///
/// ```no_run
/// use playlist_export::auth::AccessToken;
/// use playlist_export::config::PlaylistSourceConfig;
/// use playlist_export::playlists::{PlaylistSource, SpotifyClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SpotifyClient::new(&PlaylistSourceConfig::default())?;
/// let playlists = client.list_playlists(&AccessToken::new("BQD...")).await?;
/// for playlist in playlists {
///     println!("{} ({} tracks)", playlist.name, playlist.track_count);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SpotifyClient {
    client: reqwest::Client,
    base_url: url::Url,
    page_limit: u32,
}

impl SpotifyClient {
    /// Build a client from configuration
    pub fn new(config: &PlaylistSourceConfig) -> Result<Self> {
        let base_url = url::Url::parse(config.api_base_url.trim_end_matches('/')).map_err(|e| {
            Error::Config {
                message: format!("invalid api_base_url: {}", e),
                key: Some("api_base_url".into()),
            }
        })?;

        // Timeout keeps a stalled upstream from hanging the request
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            page_limit: config.page_limit.clamp(1, 50),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<url::Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config {
                message: "api_base_url cannot be a base URL".into(),
                key: Some("api_base_url".into()),
            })?
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("limit", &self.page_limit.to_string());
        Ok(url)
    }

    /// Read every page starting at `first`
    async fn collect_pages<T>(&self, token: &AccessToken, first: url::Url) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut next = Some(first.to_string());
        let mut pages = 0;

        while let Some(url) = next {
            pages += 1;
            if pages > MAX_PAGES {
                tracing::warn!(pages, "stopping pagination at page limit");
                break;
            }

            let page: Page<T> = self.get_json(token, &url).await?;
            items.extend(page.items);
            next = page.next;
        }

        tracing::debug!(items = items.len(), pages, "listing complete");
        Ok(items)
    }

    async fn get_json<T>(&self, token: &AccessToken, url: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .get(url)
            .bearer_auth(&token.token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized(crate::auth::TOKEN_EXPIRED.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), url, "playlist source request failed");
            return Err(Error::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PlaylistSource for SpotifyClient {
    async fn list_playlists(&self, token: &AccessToken) -> Result<Vec<Playlist>> {
        let url = self.endpoint(&["me", "playlists"])?;
        let raw: Vec<Option<RawPlaylist>> = self.collect_pages(token, url).await?;
        Ok(raw.into_iter().flatten().map(Playlist::from).collect())
    }

    async fn list_tracks(&self, token: &AccessToken, playlist_id: &str) -> Result<Vec<Track>> {
        let url = self.endpoint(&["playlists", playlist_id, "tracks"])?;
        let raw: Vec<RawPlaylistItem> = self.collect_pages(token, url).await?;
        Ok(raw
            .into_iter()
            .filter_map(|item| item.track)
            .map(Track::from)
            .collect())
    }
}

/// Pull `error.message` out of a Web API error body
fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

// Wire formats

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct RawPlaylist {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    owner: Option<RawOwner>,
    #[serde(default)]
    tracks: Option<RawTrackSummary>,
    #[serde(default)]
    images: Option<Vec<RawImage>>,
    #[serde(default)]
    external_urls: Option<RawExternalUrls>,
}

#[derive(Deserialize)]
struct RawOwner {
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct RawTrackSummary {
    total: u64,
}

#[derive(Deserialize)]
struct RawImage {
    url: String,
}

#[derive(Deserialize)]
struct RawExternalUrls {
    spotify: Option<String>,
}

#[derive(Deserialize)]
struct RawPlaylistItem {
    track: Option<RawTrack>,
}

#[derive(Deserialize)]
struct RawTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<RawArtist>,
    #[serde(default)]
    album: Option<RawAlbum>,
    #[serde(default)]
    duration_ms: u64,
}

#[derive(Deserialize)]
struct RawArtist {
    name: String,
}

#[derive(Deserialize)]
struct RawAlbum {
    name: String,
}

impl From<RawPlaylist> for Playlist {
    fn from(raw: RawPlaylist) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            description: raw.description.filter(|d| !d.is_empty()),
            owner: raw.owner.and_then(|o| o.display_name),
            track_count: raw.tracks.map(|t| t.total).unwrap_or(0),
            image_url: raw
                .images
                .and_then(|images| images.into_iter().next())
                .map(|image| image.url),
            url: raw.external_urls.and_then(|u| u.spotify),
        }
    }
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            artists: raw.artists.into_iter().map(|a| a.name).collect(),
            album: raw.album.map(|a| a.name),
            duration_ms: raw.duration_ms,
        }
    }
}
