// crates/trust-exchange-transport/src/provider.rs
// ============================================================================
// Module: HTTP Provider Transport
// Description: reqwest-backed ProviderTransport implementation.
// Purpose: Present an approved authorization at a Broker-supplied Provider
//          endpoint and return the signed envelope.
// Dependencies: reqwest, trust-exchange-core
// ============================================================================

//! ## Overview
//! Provider endpoints come from the Broker's approval, so they are validated
//! on every call: they must be absolute `https` URLs unless the policy
//! allows plain `http`. An endpoint that fails validation is rejected before
//! any connection is made. The response envelope is returned undecoded
//! beyond its JSON shape; signature checks belong to the exchange runtime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use trust_exchange_core::Clock;
use trust_exchange_core::ProviderDataEnvelope;
use trust_exchange_core::ProviderDataRequest;
use trust_exchange_core::ProviderTransport;
use trust_exchange_core::TransportError;

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
// SECTION: Policy
// ============================================================================

/// Limits applied to Provider calls.
#[derive(Debug, Clone)]
pub struct HttpProviderPolicy {
    /// Accept `http` endpoints.
    pub allow_insecure_http: bool,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Cap on response body size.
    pub max_response_bytes: usize,
    /// Retry policy for transient faults.
    pub retry: RetryPolicy,
}

impl Default for HttpProviderPolicy {
    fn default() -> Self {
        Self {
            allow_insecure_http: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            retry: RetryPolicy::default(),
        }
    }
}

// ============================================================================
// SECTION: Transport
// ============================================================================

/// HTTP client for Provider data endpoints.
pub struct HttpProviderTransport {
    /// Shared client; endpoints vary per call.
    client: Client,
    /// Endpoint and size limits.
    policy: HttpProviderPolicy,
    /// Time source for retry sleeps.
    clock: Arc<dyn Clock>,
}

impl HttpProviderTransport {
    /// Builds a Provider transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportBuildError::Client`] when the HTTP client cannot be
    /// built.
    pub fn new(policy: HttpProviderPolicy, clock: Arc<dyn Clock>) -> Result<Self, TransportBuildError> {
        let client = build_client(policy.connect_timeout, policy.request_timeout, HeaderMap::new())?;
        Ok(Self {
            client,
            policy,
            clock,
        })
    }
}

impl std::fmt::Debug for HttpProviderTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderTransport").field("policy", &self.policy).finish_non_exhaustive()
    }
}

#[async_trait]
impl ProviderTransport for HttpProviderTransport {
    async fn request_data(
        &self,
        endpoint: &str,
        request: &ProviderDataRequest,
    ) -> Result<ProviderDataEnvelope, TransportError> {
        let url = parse_url(endpoint, self.policy.allow_insecure_http).map_err(|err| {
            TransportError::Rejected {
                status: None,
                message: format!("provider endpoint refused: {err}"),
            }
        })?;
        let limit = self.policy.max_response_bytes;
        execute_with_retry(&self.policy.retry, self.clock.as_ref(), "request_data", || {
            let pending = self.client.post(url.clone()).json(request).send();
            async move {
                let response = pending.await.map_err(|err| classify_send_error(&err))?;
                decode_json(response, limit).await
            }
        })
        .await
    }
}
