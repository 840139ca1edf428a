// crates/trust-exchange-transport/src/broker.rs
// ============================================================================
// Module: HTTP Broker Transport
// Description: reqwest-backed BrokerTransport implementation.
// Purpose: Reach the Broker's REST surface with client identification,
//          bounded responses, and retry on transient faults.
// Dependencies: reqwest, serde, url, trust-exchange-core
// ============================================================================

//! ## Overview
//! [`HttpBrokerTransport`] maps each [`BrokerTransport`] operation onto one
//! REST route below the configured base URL:
//!
//! | Operation | Route |
//! |-----------|-------|
//! | `get_my_institution` | `GET institutions/me` |
//! | `get_public_key` | `GET public-key` |
//! | `create_data_request` | `POST data-requests` |
//! | `get_request_status` | `GET data-requests/{id}/status` |
//! | `get_institution_by_id` | `GET institutions/{id}` |
//! | `submit_requester_signature` | `POST data-requests/{id}/requester-signature` |
//!
//! Every call carries `x-client-id` and, when an API key is configured,
//! `Authorization: Bearer`. Identifiers are percent-encoded as path segments.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use trust_exchange_core::BrokerTransport;
use trust_exchange_core::Clock;
use trust_exchange_core::CreatedRequest;
use trust_exchange_core::FinalStatus;
use trust_exchange_core::Institution;
use trust_exchange_core::InstitutionId;
use trust_exchange_core::InstitutionRecord;
use trust_exchange_core::NewDataRequest;
use trust_exchange_core::PublicKey;
use trust_exchange_core::RequestId;
use trust_exchange_core::RequesterSignatureSubmission;
use trust_exchange_core::StatusSnapshot;
use trust_exchange_core::TransportError;
use url::Url;

use crate::http::DEFAULT_CONNECT_TIMEOUT;
use crate::http::DEFAULT_MAX_RESPONSE_BYTES;
use crate::http::DEFAULT_REQUEST_TIMEOUT;
use crate::http::TransportBuildError;
use crate::http::build_client;
use crate::http::classify_send_error;
use crate::http::decode_json;
use crate::http::parse_url;
use crate::retry::RetryPolicy;
use crate::retry::execute_with_retry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header identifying the calling institution.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Connection settings for the Broker.
#[derive(Clone)]
pub struct HttpBrokerConfig {
    /// Base URL of the Broker API.
    pub base_url: String,
    /// Identifier sent in `x-client-id`.
    pub client_id: InstitutionId,
    /// Bearer token, when the Broker requires one.
    pub api_key: Option<String>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Cap on response body size.
    pub max_response_bytes: usize,
    /// Retry policy for transient faults.
    pub retry: RetryPolicy,
    /// Accept an `http` base URL.
    pub allow_insecure_http: bool,
}

impl HttpBrokerConfig {
    /// Creates a config with default timeouts, limits, and retries.
    #[must_use]
    pub fn new(base_url: impl Into<String>, client_id: InstitutionId) -> Self {
        Self {
            base_url: base_url.into(),
            client_id,
            api_key: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            retry: RetryPolicy::default(),
            allow_insecure_http: false,
        }
    }
}

impl fmt::Debug for HttpBrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBrokerConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("retry", &self.retry)
            .field("allow_insecure_http", &self.allow_insecure_http)
            .finish()
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Body of `GET public-key`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyResponse {
    /// Broker signing key, base64.
    public_key: PublicKey,
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// HTTP client for the Broker API.
///
/// # Invariants
/// - `base_url` is an absolute `https` URL unless insecure HTTP was allowed.
/// - Every request carries the configured client id header.
pub struct HttpBrokerTransport {
    /// Parsed base URL.
    base_url: Url,
    /// Client with default headers and timeouts.
    client: Client,
    /// Cap on response body size.
    max_response_bytes: usize,
    /// Retry policy for transient faults.
    retry: RetryPolicy,
    /// Time source for retry sleeps.
    clock: Arc<dyn Clock>,
}

impl HttpBrokerTransport {
    /// Builds a Broker transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportBuildError`] when the URL or a header value is
    /// invalid, or the HTTP client cannot be built.
    pub fn new(config: HttpBrokerConfig, clock: Arc<dyn Clock>) -> Result<Self, TransportBuildError> {
        let base_url = parse_url(&config.base_url, config.allow_insecure_http)?;
        let headers = build_headers(&config)?;
        let client = build_client(config.connect_timeout, config.request_timeout, headers)?;
        Ok(Self {
            base_url,
            client,
            max_response_bytes: config.max_response_bytes,
            retry: config.retry,
            clock,
        })
    }

    /// Appends `segments` to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Rejected {
                status: None,
                message: format!("base url {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends one request and decodes its JSON body.
    async fn send<T: DeserializeOwned + Send>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = request.send().await.map_err(|err| classify_send_error(&err))?;
        decode_json(response, self.max_response_bytes).await
    }

    /// Issues a retried GET.
    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<T, TransportError> {
        execute_with_retry(&self.retry, self.clock.as_ref(), operation, move || {
            self.send(self.client.get(url.clone()))
        })
        .await
    }

    /// Issues a retried POST with a JSON body.
    async fn post_json<B: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        operation: &'static str,
        url: Url,
        body: &B,
    ) -> Result<T, TransportError> {
        execute_with_retry(&self.retry, self.clock.as_ref(), operation, move || {
            self.send(self.client.post(url.clone()).json(body))
        })
        .await
    }
}

impl fmt::Debug for HttpBrokerTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBrokerTransport")
            .field("base_url", &self.base_url.as_str())
            .field("max_response_bytes", &self.max_response_bytes)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Builds the default headers sent with every Broker call.
fn build_headers(config: &HttpBrokerConfig) -> Result<HeaderMap, TransportBuildError> {
    let mut headers = HeaderMap::new();
    let client_id = HeaderValue::from_str(config.client_id.as_str())
        .map_err(|_| TransportBuildError::InvalidHeader("client id".to_string()))?;
    headers.insert(CLIENT_ID_HEADER, client_id);
    if let Some(api_key) = &config.api_key {
        let mut value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| TransportBuildError::InvalidHeader("api key".to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

#[async_trait]
impl BrokerTransport for HttpBrokerTransport {
    async fn get_my_institution(&self) -> Result<Institution, TransportError> {
        let url = self.endpoint(&["institutions", "me"])?;
        let record: InstitutionRecord = self.get_json("get_my_institution", url).await?;
        let id = record
            .id
            .clone()
            .ok_or_else(|| TransportError::Protocol("own institution record has no id".to_string()))?;
        Ok(record.into_institution(&id))
    }

    async fn get_public_key(&self) -> Result<PublicKey, TransportError> {
        let url = self.endpoint(&["public-key"])?;
        let response: PublicKeyResponse = self.get_json("get_public_key", url).await?;
        Ok(response.public_key)
    }

    async fn create_data_request(
        &self,
        request: &NewDataRequest,
    ) -> Result<CreatedRequest, TransportError> {
        let url = self.endpoint(&["data-requests"])?;
        self.post_json("create_data_request", url, request).await
    }

    async fn get_request_status(
        &self,
        request_id: &RequestId,
    ) -> Result<StatusSnapshot, TransportError> {
        let url = self.endpoint(&["data-requests", request_id.as_str(), "status"])?;
        self.get_json("get_request_status", url).await
    }

    async fn get_institution_by_id(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Institution, TransportError> {
        let url = self.endpoint(&["institutions", institution_id.as_str()])?;
        let record: InstitutionRecord = self.get_json("get_institution_by_id", url).await?;
        Ok(record.into_institution(institution_id))
    }

    async fn submit_requester_signature(
        &self,
        submission: &RequesterSignatureSubmission,
    ) -> Result<FinalStatus, TransportError> {
        let url = self.endpoint(&[
            "data-requests",
            submission.request_id.as_str(),
            "requester-signature",
        ])?;
        self.post_json("submit_requester_signature", url, submission).await
    }
}
