//! Access tokens for the streaming-service Web API
//!
//! The OAuth dance happens elsewhere; this crate only needs to know whether a
//! usable bearer token is at hand. An [`AuthAdapter`] supplies the token (from
//! request headers, a session store, or a fixed value), and [`authorize`]
//! turns "missing" and "expired" into [`Error::Unauthorized`].

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Message for a request without any token
pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Message for a token past its expiry
pub const TOKEN_EXPIRED: &str = "Token expired";

/// Bearer token plus its expiry, if known
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    /// Raw bearer token
    pub token: String,
    /// When the token stops being valid; `None` if unknown
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Token without a known expiry
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Token that expires at `expires_at`
    pub fn expiring(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Whether the token has expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Source of the caller's access token
pub trait AuthAdapter: Send + Sync {
    /// The current token, if the caller has one
    fn current_token(&self) -> Option<AccessToken>;
}

/// Fixed token, for embedding and tests
#[derive(Clone, Debug)]
pub struct StaticToken(pub AccessToken);

impl AuthAdapter for StaticToken {
    fn current_token(&self) -> Option<AccessToken> {
        Some(self.0.clone())
    }
}

/// No token at all
#[derive(Clone, Copy, Debug, Default)]
pub struct NoToken;

impl AuthAdapter for NoToken {
    fn current_token(&self) -> Option<AccessToken> {
        None
    }
}

/// Return a usable token or the reason there is none
///
/// # Errors
///
/// [`Error::Unauthorized`] with [`NOT_AUTHENTICATED`] or [`TOKEN_EXPIRED`].
pub fn authorize(adapter: &dyn AuthAdapter, now: DateTime<Utc>) -> Result<AccessToken> {
    match adapter.current_token() {
        None => Err(Error::Unauthorized(NOT_AUTHENTICATED.to_string())),
        Some(token) if token.token.is_empty() => {
            Err(Error::Unauthorized(NOT_AUTHENTICATED.to_string()))
        }
        Some(token) if token.is_expired(now) => Err(Error::Unauthorized(TOKEN_EXPIRED.to_string())),
        Some(token) => Ok(token),
    }
}
