//! Bearer-token extraction for the REST API
//!
//! The browser front end holds the streaming-service token and forwards it as
//! `Authorization: Bearer <token>`, optionally with `X-Token-Expires-At`
//! (unix seconds). Handlers that need a token take [`Authenticated`]; handlers
//! that can use one but do not require it take [`MaybeAuthenticated`].

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use chrono::{DateTime, Utc};

use crate::api::AppState;
use crate::auth::{AccessToken, AuthAdapter, authorize};
use crate::error::Error;

/// Header carrying the token expiry as unix seconds
pub const EXPIRES_AT_HEADER: &str = "x-token-expires-at";

/// Token source reading request headers
#[derive(Clone, Debug, Default)]
pub struct HeaderAuth {
    token: Option<AccessToken>,
}

impl HeaderAuth {
    /// Parse `Authorization` and `X-Token-Expires-At`
    ///
    /// An expiry header that cannot be parsed makes the token count as expired.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let token = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                let (scheme, token) = value.trim().split_once(' ')?;
                scheme
                    .eq_ignore_ascii_case("bearer")
                    .then(|| token.trim().to_string())
            })
            .filter(|token| !token.is_empty());

        let Some(token) = token else {
            return Self { token: None };
        };

        let expires_at = headers.get(EXPIRES_AT_HEADER).map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });

        Self {
            token: Some(AccessToken { token, expires_at }),
        }
    }
}

impl AuthAdapter for HeaderAuth {
    fn current_token(&self) -> Option<AccessToken> {
        self.token.clone()
    }
}

/// Extractor for a valid token; rejects with 401 otherwise
pub struct Authenticated(pub AccessToken);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let source = state.token_source(&parts.headers);
        authorize(source.as_ref(), Utc::now()).map(Authenticated)
    }
}

/// Extractor for an optional valid token; never rejects
pub struct MaybeAuthenticated(pub Option<AccessToken>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthenticated {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let source = state.token_source(&parts.headers);
        Ok(MaybeAuthenticated(authorize(source.as_ref(), Utc::now()).ok()))
    }
}
