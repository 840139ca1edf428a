// crates/trust-exchange-transport/src/http.rs
// ============================================================================
// Module: HTTP Plumbing
// Description: Shared reqwest client construction and response handling.
// Purpose: Map HTTP outcomes onto transport error classes uniformly for both
//          the Broker and Provider clients.
// Dependencies: reqwest, serde, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! Both HTTP transports share one way of building clients and one way of
//! turning responses into values or [`TransportError`]s:
//! - `404` maps to [`TransportError::NotFound`];
//! - `408`, `429`, and `5xx` map to [`TransportError::Transient`];
//! - any other non-success status maps to [`TransportError::Rejected`];
//! - oversized or undecodable bodies map to [`TransportError::Protocol`].
//!
//! Response bodies are read incrementally and abandoned once they exceed the
//! configured limit. Redirects are never followed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::redirect;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use trust_exchange_core::TransportError;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default cap on response body size.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest error detail copied out of a rejection body.
const MAX_ERROR_DETAIL_CHARS: usize = 256;

// ============================================================================
// SECTION: Build Errors
// ============================================================================

/// Errors raised while constructing an HTTP transport.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum TransportBuildError {
    /// The URL does not parse or cannot carry path segments.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The URL scheme is not permitted.
    #[error("insecure url scheme: {0}")]
    InsecureScheme(String),
    /// A configured header value is not valid HTTP.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
    /// The HTTP client could not be built.
    #[error("http client unavailable: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Client Construction
// ============================================================================

/// Builds a client with timeouts, default headers, and redirects disabled.
pub(crate) fn build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
    headers: HeaderMap,
) -> Result<Client, TransportBuildError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .redirect(redirect::Policy::none())
        .default_headers(headers)
        .build()
        .map_err(|err| TransportBuildError::Client(err.to_string()))
}

/// Parses `raw` and checks its scheme.
///
/// `http` is accepted only when `allow_http` is set.
pub(crate) fn parse_url(raw: &str, allow_http: bool) -> Result<Url, TransportBuildError> {
    let url = Url::parse(raw).map_err(|err| TransportBuildError::InvalidUrl(format!("{raw}: {err}")))?;
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        "http" => return Err(TransportBuildError::InsecureScheme(raw.to_string())),
        other => {
            return Err(TransportBuildError::InvalidUrl(format!("unsupported scheme {other}")));
        }
    }
    if url.cannot_be_a_base() {
        return Err(TransportBuildError::InvalidUrl(format!("{raw}: not a base url")));
    }
    Ok(url)
}

// ============================================================================
// SECTION: Error Classification
// ============================================================================

/// Classifies a failure to obtain a response.
pub(crate) fn classify_send_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_builder() {
        TransportError::Rejected {
            status: None,
            message: err.to_string(),
        }
    } else {
        TransportError::Transient(err.to_string())
    }
}

/// Classifies a non-success status, extracting detail from `body`.
pub(crate) fn classify_status(status: StatusCode, body: &[u8]) -> TransportError {
    let detail = error_detail(body);
    let message = if detail.is_empty() {
        format!("http status {}", status.as_u16())
    } else {
        format!("http status {}: {detail}", status.as_u16())
    };
    match status {
        StatusCode::NOT_FOUND => TransportError::NotFound(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            TransportError::Transient(message)
        }
        status if status.is_server_error() => TransportError::Transient(message),
        status => TransportError::Rejected {
            status: Some(status.as_u16()),
            message,
        },
    }
}

/// Pulls a readable message out of an error body.
///
/// JSON bodies contribute their `error` or `message` string; anything else
/// is used as text, truncated.
fn error_detail(body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(Value::String(text)) = map.get(key) {
                return truncate(text);
            }
        }
    }
    truncate(String::from_utf8_lossy(body).trim())
}

/// Truncates `text` to the error detail limit on a char boundary.
fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_DETAIL_CHARS).collect()
}

// ============================================================================
// SECTION: Response Handling
// ============================================================================

/// Reads a response body, failing once it exceeds `limit` bytes.
async fn read_body_with_limit(
    mut response: Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    let mut body = Vec::new();
    let mut total: usize = 0;
    while let Some(chunk) = response.chunk().await.map_err(|err| classify_send_error(&err))? {
        let next_total = total.checked_add(chunk.len()).ok_or_else(|| {
            TransportError::Protocol(format!("response exceeds {limit} bytes"))
        })?;
        if next_total > limit {
            return Err(TransportError::Protocol(format!(
                "response of at least {next_total} bytes exceeds {limit} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
        total = next_total;
    }
    Ok(body)
}

/// Checks the status, reads the body within `limit`, and decodes it as JSON.
///
/// # Errors
///
/// Returns [`TransportError`] classified by status, size, or decoding.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: Response,
    limit: usize,
) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        let body = read_body_with_limit(response, limit).await.unwrap_or_default();
        return Err(classify_status(status, &body));
    }
    let body = read_body_with_limit(response, limit).await?;
    serde_json::from_slice(&body)
        .map_err(|err| TransportError::Protocol(format!("invalid response body: {err}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap/expect for clarity."
    )]

    use super::*;

    #[test]
    fn status_classes_map_to_transport_errors() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, b""),
            TransportError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, b""),
            TransportError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::REQUEST_TIMEOUT, b""),
            TransportError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, b""),
            TransportError::Transient(_)
        ));
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, br#"{"error":"not a member"}"#),
            TransportError::Rejected {
                status: Some(403),
                message: "http status 403: not a member".to_string(),
            }
        );
    }

    #[test]
    fn error_detail_prefers_json_fields_and_truncates_text() {
        assert_eq!(error_detail(br#"{"message":"expired"}"#), "expired");
        assert_eq!(error_detail(b"  plain failure \n"), "plain failure");
        let long = "x".repeat(1_000);
        assert_eq!(error_detail(long.as_bytes()).len(), MAX_ERROR_DETAIL_CHARS);
    }

    #[test]
    fn parse_url_enforces_scheme() {
        assert!(parse_url("https://broker.example/api", false).is_ok());
        assert!(matches!(
            parse_url("http://broker.example", false),
            Err(TransportBuildError::InsecureScheme(_))
        ));
        assert!(parse_url("http://127.0.0.1:8080", true).is_ok());
        assert!(matches!(
            parse_url("ftp://broker.example", true),
            Err(TransportBuildError::InvalidUrl(_))
        ));
        assert!(matches!(parse_url("not a url", true), Err(TransportBuildError::InvalidUrl(_))));
        assert!(matches!(
            parse_url("mailto:ops@broker.example", true),
            Err(TransportBuildError::InvalidUrl(_))
        ));
    }
}
