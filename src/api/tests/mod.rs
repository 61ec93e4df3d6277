use super::*;
use crate::auth::AccessToken;
use crate::error::{Error, Result};
use crate::jobs::test_helpers::{ScriptedFetcher, Step, test_config};
use crate::playlists::{Playlist, Track};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

mod downloads;

/// Playlist source serving canned data to one known token
struct FakePlaylists {
    token: &'static str,
    tracks: Vec<Track>,
}

impl FakePlaylists {
    fn with_tracks(count: usize) -> Self {
        let tracks = (0..count)
            .map(|i| Track {
                id: Some(format!("t{i}")),
                name: format!("Song {i}"),
                artists: vec!["Artist".to_string()],
                album: Some("Album".to_string()),
                duration_ms: 180_000,
            })
            .collect();
        Self {
            token: "good-token",
            tracks,
        }
    }

    fn check(&self, token: &AccessToken) -> Result<()> {
        if token.token == self.token {
            Ok(())
        } else {
            Err(Error::Unauthorized(crate::auth::TOKEN_EXPIRED.to_string()))
        }
    }
}

#[async_trait]
impl PlaylistSource for FakePlaylists {
    async fn list_playlists(&self, token: &AccessToken) -> Result<Vec<Playlist>> {
        self.check(token)?;
        Ok(vec![Playlist {
            id: "p1".to_string(),
            name: "Road trip".to_string(),
            description: None,
            owner: Some("me".to_string()),
            track_count: self.tracks.len() as u64,
            image_url: None,
            url: Some("https://open.spotify.com/playlist/p1".to_string()),
        }])
    }

    async fn list_tracks(&self, token: &AccessToken, playlist_id: &str) -> Result<Vec<Track>> {
        self.check(token)?;
        if playlist_id == "p1" {
            Ok(self.tracks.clone())
        } else {
            Err(Error::Upstream {
                status: 404,
                message: "Invalid playlist Id".to_string(),
            })
        }
    }
}

struct TestApp {
    router: Router,
    manager: Arc<JobManager>,
    fetcher: Arc<ScriptedFetcher>,
    _temp_dir: TempDir,
}

impl TestApp {
    async fn new(steps: Vec<Step>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);
        Self::with_config(steps, config, temp_dir).await
    }

    async fn with_config(steps: Vec<Step>, config: Config, temp_dir: TempDir) -> Self {
        let fetcher = ScriptedFetcher::new(steps);
        let manager = Arc::new(
            JobManager::with_fetcher(config.clone(), fetcher.clone())
                .await
                .unwrap(),
        );
        let router = create_router(
            manager.clone(),
            Arc::new(FakePlaylists::with_tracks(12)),
            Arc::new(config),
        );
        Self {
            router,
            manager,
            fetcher,
            _temp_dir: temp_dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Poll GET /download-status/:id until `completed` is true
    async fn wait_until_completed(&self, id: &str) -> serde_json::Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let response = self.get(&format!("/download-status/{id}")).await;
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            if body["completed"] == true {
                return body;
            }
            assert!(tokio::time::Instant::now() < deadline, "job {id} never completed");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

async fn body_bytes(response: Response) -> axum::body::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn api_server_spawns_and_stops_on_shutdown() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let manager = Arc::new(
        JobManager::with_fetcher((*config).clone(), ScriptedFetcher::new(vec![]))
            .await
            .unwrap(),
    );
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(start_api_server_with_shutdown(
        manager,
        Arc::new(FakePlaylists::with_tracks(0)),
        config,
        async move {
            let _ = stop_rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn cors_allows_any_origin_by_default() {
    let app = TestApp::new(vec![]).await;

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn cors_restricts_to_configured_origins() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    config.api.cors_origins = vec!["http://localhost:3000".to_string()];
    let app = TestApp::with_config(vec![], config, temp_dir).await;

    let allowed = app
        .send(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        allowed.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );

    let denied = app
        .send(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(denied.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn cors_disabled_sends_no_headers() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    config.api.cors_enabled = false;
    let app = TestApp::with_config(vec![], config, temp_dir).await;

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn swagger_ui_can_be_disabled() {
    let app = TestApp::new(vec![]).await;
    let response = app.get("/swagger-ui/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    config.api.swagger_ui = false;
    let app = TestApp::with_config(vec![], config, temp_dir).await;
    let response = app.get("/swagger-ui/openapi.json").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
