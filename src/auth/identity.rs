//! Token issuance against the identity service.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AuthError, AuthFuture, AuthToken, Credentials, TokenIssuer};

/// Public identity endpoint for token issuance.
pub const DEFAULT_IDENTITY_URL: &str =
    "https://api-identity-infrastructure.nhncloudservice.com/v2.0/tokens";

#[derive(Serialize)]
struct TokenRequest<'a> {
    auth: TokenRequestAuth<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequestAuth<'a> {
    tenant_id: &'a str,
    password_credentials: PasswordCredentials<'a>,
}

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access: TokenAccess,
}

#[derive(Deserialize)]
struct TokenAccess {
    token: TokenBody,
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(default)]
    id: String,
    expires: DateTime<Utc>,
}

/// HTTP client for the identity service.
#[derive(Clone, Debug)]
pub struct IdentityClient {
    http: reqwest::Client,
    url: String,
}

impl IdentityClient {
    /// Creates a client for the public identity endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Transport`] when the HTTP client cannot be built.
    pub fn new(request_timeout: Duration) -> Result<Self, AuthError> {
        Self::with_url(DEFAULT_IDENTITY_URL, request_timeout)
    }

    /// Creates a client posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Transport`] when the HTTP client cannot be built.
    pub fn with_url(url: impl Into<String>, request_timeout: Duration) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| AuthError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    async fn request_token(&self, credentials: &Credentials) -> Result<AuthToken, AuthError> {
        let payload = TokenRequest {
            auth: TokenRequestAuth {
                tenant_id: &credentials.tenant_id,
                password_credentials: PasswordCredentials {
                    username: &credentials.username,
                    password: &credentials.password,
                },
            },
        };
        debug!(url = %self.url, "requesting token");
        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AuthError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| AuthError::Transport(err.to_string()))?;
        if status != StatusCode::OK {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_slice(&body).map_err(|err| AuthError::Decode(err.to_string()))?;
        let TokenBody { id, expires } = parsed.access.token;
        if id.trim().is_empty() {
            return Err(AuthError::Decode(String::from(
                "response is missing `access.token.id`",
            )));
        }
        Ok(AuthToken::new(id, expires))
    }
}

impl TokenIssuer for IdentityClient {
    fn issue<'a>(&'a self, credentials: &'a Credentials) -> AuthFuture<'a, AuthToken> {
        Box::pin(self.request_token(credentials))
    }
}
