//! Uniform request execution and response decoding for the NHN backend.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::ApiError;

use super::NhnBackend;

const AUTH_HEADER: &str = "X-Auth-Token";

/// Lookups and updates.
pub(super) const EXPECT_OK: &[StatusCode] = &[StatusCode::OK];
/// Networking resource creation.
pub(super) const EXPECT_CREATED: &[StatusCode] = &[StatusCode::CREATED];
/// Creation calls documented as answering either 200 or 201.
pub(super) const EXPECT_OK_OR_CREATED: &[StatusCode] =
    &[StatusCode::OK, StatusCode::CREATED];
/// Asynchronous server creation.
pub(super) const EXPECT_ACCEPTED: &[StatusCode] = &[StatusCode::ACCEPTED];

/// Checks the response status against the operation's declared success
/// statuses, preserving the raw body on rejection.
pub(super) fn check_status(
    operation: &str,
    status: StatusCode,
    expected: &[StatusCode],
    body: &[u8],
) -> Result<(), ApiError> {
    if expected.contains(&status) {
        return Ok(());
    }
    Err(ApiError::Rejected {
        operation: operation.to_owned(),
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).into_owned(),
    })
}

/// Checks the status and decodes the JSON body into `T`.
pub(super) fn decode_body<T: DeserializeOwned>(
    operation: &str,
    status: StatusCode,
    expected: &[StatusCode],
    body: &[u8],
) -> Result<T, ApiError> {
    check_status(operation, status, expected, body)?;
    serde_json::from_slice(body).map_err(|err| ApiError::Decode {
        operation: operation.to_owned(),
        message: err.to_string(),
    })
}

/// Rejects blank identifiers in otherwise well-formed responses.
pub(super) fn require_field(
    operation: &str,
    field: &str,
    value: String,
) -> Result<String, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Decode {
            operation: operation.to_owned(),
            message: format!("response is missing `{field}`"),
        });
    }
    Ok(value)
}

impl NhnBackend {
    pub(super) async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
        expected: &[StatusCode],
    ) -> Result<T, ApiError> {
        let (status, body) = self.send(operation, request).await?;
        decode_body(operation, status, expected, &body)
    }

    pub(super) async fn send_unit(
        &self,
        operation: &str,
        request: RequestBuilder,
        expected: &[StatusCode],
    ) -> Result<(), ApiError> {
        let (status, body) = self.send(operation, request).await?;
        check_status(operation, status, expected, &body)
    }

    async fn send(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        debug!(operation, "sending request");
        let response = request
            .header(AUTH_HEADER, self.token.secret())
            .send()
            .await
            .map_err(|err| ApiError::Transport {
                operation: operation.to_owned(),
                message: err.to_string(),
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|err| ApiError::Transport {
            operation: operation.to_owned(),
            message: err.to_string(),
        })?;
        debug!(operation, status = status.as_u16(), "received response");
        Ok((status, body.to_vec()))
    }
}
