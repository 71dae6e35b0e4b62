//! Identity tokens for the provider API.
//!
//! A [`TokenProvider`] returns a cached token while it remains valid and asks
//! a [`TokenIssuer`] for a fresh one otherwise, rewriting the cache.

mod cache;
mod identity;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Duration as TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use cache::TokenCache;
pub use identity::{DEFAULT_IDENTITY_URL, IdentityClient};

/// Tokens expiring within this many seconds are treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// Errors raised while obtaining or caching a token.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AuthError {
    /// The identity request could not be completed.
    #[error("token request failed: {0}")]
    Transport(String),
    /// The identity service rejected the credentials or request.
    #[error("identity service rejected token request with status {status}: {body}")]
    Rejected {
        /// HTTP status code returned.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The identity response did not contain a usable token.
    #[error("unexpected token response: {0}")]
    Decode(String),
    /// Reading or writing the token cache failed.
    #[error("token cache {path}: {message}")]
    Cache {
        /// Cache file path.
        path: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Bearer token and its expiry.
#[derive(Clone, Deserialize, Eq, PartialEq, Serialize)]
pub struct AuthToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Wraps a token secret issued by the identity service.
    #[must_use]
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// Raw token value sent in the `X-Auth-Token` header.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Expiry reported by the identity service.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns `true` when the token stays valid for at least `margin` past
    /// `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: TimeDelta) -> bool {
        !self.secret.trim().is_empty() && now + margin < self.expires_at
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Tenant credentials used to issue tokens.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    /// Tenant identifier.
    pub tenant_id: String,
    /// API user name (usually an e-mail address).
    pub username: String,
    /// API password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Future returned by [`TokenIssuer::issue`].
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + Send + 'a>>;

/// Source of freshly issued tokens.
pub trait TokenIssuer: Send + Sync {
    /// Exchanges credentials for a new token.
    fn issue<'a>(&'a self, credentials: &'a Credentials) -> AuthFuture<'a, AuthToken>;
}

/// Cache-then-issue token lookup.
#[derive(Debug)]
pub struct TokenProvider<I> {
    issuer: I,
    cache: TokenCache,
    margin: TimeDelta,
}

impl<I: TokenIssuer> TokenProvider<I> {
    /// Creates a provider backed by `issuer` and `cache`.
    #[must_use]
    pub fn new(issuer: I, cache: TokenCache) -> Self {
        Self {
            issuer,
            cache,
            margin: TimeDelta::seconds(EXPIRY_MARGIN_SECS),
        }
    }

    /// Overrides the expiry safety margin.
    #[must_use]
    pub const fn with_margin(mut self, margin: TimeDelta) -> Self {
        self.margin = margin;
        self
    }

    /// Returns a token valid at `now` for `credentials`' tenant.
    ///
    /// A failure to rewrite the cache is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when no cached token is usable and issuing a new
    /// one fails.
    pub async fn token(
        &self,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> Result<AuthToken, AuthError> {
        if let Some(cached) = self.cache.load(&credentials.tenant_id)
            && cached.is_valid_at(now, self.margin)
        {
            info!(expires_at = %cached.expires_at(), "reusing cached token");
            return Ok(cached);
        }

        let token = self.issuer.issue(credentials).await?;
        info!(expires_at = %token.expires_at(), "issued new token");
        if let Err(err) = self.cache.store(&credentials.tenant_id, &token) {
            warn!(error = %err, "failed to write token cache");
        }
        Ok(token)
    }
}
