//! Application state for the API server

use crate::api::auth::HeaderAuth;
use crate::auth::AuthAdapter;
use crate::playlists::PlaylistSource;
use crate::{Config, JobManager};
use axum::http::HeaderMap;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clone) and provides
/// access to the job manager, the playlist source and configuration.
#[derive(Clone)]
pub struct AppState {
    /// The job manager
    pub manager: Arc<JobManager>,

    /// Streaming-service Web API client
    pub playlists: Arc<dyn PlaylistSource>,

    /// Configuration (read-only)
    pub config: Arc<Config>,

    /// Token source used instead of request headers, if set
    pub auth: Option<Arc<dyn AuthAdapter>>,
}

impl AppState {
    /// Create a new AppState that reads tokens from request headers
    pub fn new(
        manager: Arc<JobManager>,
        playlists: Arc<dyn PlaylistSource>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            manager,
            playlists,
            config,
            auth: None,
        }
    }

    /// Use a fixed token source instead of request headers
    pub fn with_auth(mut self, auth: Arc<dyn AuthAdapter>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Token source for one request
    pub fn token_source(&self, headers: &HeaderMap) -> Arc<dyn AuthAdapter> {
        match &self.auth {
            Some(auth) => auth.clone(),
            None => Arc::new(HeaderAuth::from_headers(headers)),
        }
    }
}
