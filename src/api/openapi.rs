//! OpenAPI documentation and schema generation
//!
//! The document is generated at compile time with utoipa and served at
//! `/openapi.json`; `/swagger-ui` renders it when enabled.

use utoipa::OpenApi;

/// OpenAPI documentation for the playlist-export REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "playlist-export REST API",
        version = "0.1.0",
        description = "Start playlist exports, poll their progress and download the finished track archives",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        // Export jobs
        crate::api::routes::start_download,
        crate::api::routes::create_download,
        crate::api::routes::download_status,
        crate::api::routes::download_archive,

        // Playlists
        crate::api::routes::list_playlists,
        crate::api::routes::list_playlist_tracks,
        crate::api::routes::check_auth,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::JobId,
        crate::types::JobStatus,
        crate::types::Progress,
        crate::types::JobView,
        crate::types::Event,
        crate::playlists::Playlist,
        crate::playlists::Track,
        crate::api::routes::StartDownloadResponse,
        crate::api::routes::CreateDownloadRequest,
        crate::api::routes::PlaylistsResponse,
        crate::api::routes::TracksResponse,
        crate::api::routes::AuthStatus,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Export jobs - Start exports, poll status, fetch archives"),
        (name = "playlists", description = "Playlists - Browse the streaming-service library with a bearer token"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the bearer scheme used by the playlist endpoints
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/download/{id}",
            "/downloads",
            "/download-status/{id}",
            "/download-archive/{id}",
            "/api/playlists",
            "/api/playlists/{id}/tracks",
            "/check_auth",
            "/health",
            "/openapi.json",
            "/events",
        ] {
            assert!(paths.contains(&expected), "missing path {expected}");
        }
    }

    #[test]
    fn spec_has_schemas_and_bearer_scheme() {
        let components = ApiDoc::openapi().components.unwrap();
        assert!(components.schemas.contains_key("JobView"));
        assert!(components.schemas.contains_key("ApiError"));
        assert!(components.security_schemes.contains_key("bearer"));
    }

    #[test]
    fn spec_has_tags_and_info() {
        let spec = ApiDoc::openapi();
        let tags = spec.tags.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["downloads", "playlists", "system"]);
        assert_eq!(spec.info.title, "playlist-export REST API");
    }

    #[test]
    fn spec_serializes_as_openapi_3() {
        let json = serde_json::to_value(ApiDoc::openapi()).expect("Should serialize to JSON");
        let version = json["openapi"].as_str().unwrap();
        assert!(version.starts_with("3."));
    }
}
