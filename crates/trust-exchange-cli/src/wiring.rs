// crates/trust-exchange-cli/src/wiring.rs
// ============================================================================
// Module: Engine Wiring
// Description: Builds an exchange engine from validated configuration.
// Purpose: Keep command handlers free of transport and policy plumbing.
// Dependencies: trust-exchange-config, trust-exchange-core,
//               trust-exchange-transport
// ============================================================================

//! ## Overview
//! Converts a [`TrustExchangeConfig`] into the transport configurations,
//! retry policy, and polling settings the engine needs, then assembles an
//! [`ExchangeEngine`] around one shared identity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use trust_exchange_config::RetryConfig;
use trust_exchange_config::TrustExchangeConfig;
use trust_exchange_core::BrokerTransport;
use trust_exchange_core::Clock;
use trust_exchange_core::DataOwnerId;
use trust_exchange_core::ExchangeEngine;
use trust_exchange_core::ExchangeParams;
use trust_exchange_core::ExchangeSettings;
use trust_exchange_core::IdentityContext;
use trust_exchange_core::InstitutionId;
use trust_exchange_core::KeyPair;
use trust_exchange_core::ProviderTransport;
use trust_exchange_core::RelationshipId;
use trust_exchange_core::SchemaId;
use trust_exchange_core::Timestamp;
use trust_exchange_transport::HttpBrokerConfig;
use trust_exchange_transport::HttpBrokerTransport;
use trust_exchange_transport::HttpProviderPolicy;
use trust_exchange_transport::HttpProviderTransport;
use trust_exchange_transport::RetryPolicy;

use crate::error::CliError;
use crate::error::CliResult;

// ============================================================================
// SECTION: Conversions
// ============================================================================

/// Maps the `[retry]` section onto a transport retry policy.
#[must_use]
pub fn retry_policy(config: &RetryConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.max_attempts,
        config.initial_delay(),
        config.max_delay(),
        config.backoff_multiplier,
    )
}

/// Builds the Broker transport configuration.
#[must_use]
pub fn broker_config(config: &TrustExchangeConfig) -> HttpBrokerConfig {
    let mut broker = HttpBrokerConfig::new(config.broker.base_url.trim(), config.client_id());
    broker.api_key.clone_from(&config.broker.api_key);
    broker.connect_timeout = config.broker.connect_timeout();
    broker.request_timeout = config.broker.request_timeout();
    broker.max_response_bytes = config.broker.max_response_bytes;
    broker.allow_insecure_http = config.broker.allow_insecure_http;
    broker.retry = retry_policy(&config.retry);
    broker
}

/// Builds the Provider transport policy.
#[must_use]
pub fn provider_policy(config: &TrustExchangeConfig) -> HttpProviderPolicy {
    HttpProviderPolicy {
        allow_insecure_http: config.provider.allow_insecure_http,
        connect_timeout: config.provider.connect_timeout(),
        request_timeout: config.provider.request_timeout(),
        max_response_bytes: config.provider.max_response_bytes,
        retry: retry_policy(&config.retry),
    }
}

/// Builds the engine's polling settings.
#[must_use]
pub const fn exchange_settings(config: &TrustExchangeConfig) -> ExchangeSettings {
    ExchangeSettings {
        poll_interval: config.polling.interval(),
        approval_timeout: config.polling.approval_timeout(),
    }
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Assembles an engine over HTTP transports.
///
/// # Errors
///
/// Returns [`CliError::Transport`] when a transport cannot be built.
pub fn build_engine(
    config: &TrustExchangeConfig,
    key_pair: KeyPair,
    clock: Arc<dyn Clock>,
) -> CliResult<ExchangeEngine> {
    let broker: Arc<dyn BrokerTransport> =
        Arc::new(HttpBrokerTransport::new(broker_config(config), Arc::clone(&clock))?);
    let provider: Arc<dyn ProviderTransport> =
        Arc::new(HttpProviderTransport::new(provider_policy(config), Arc::clone(&clock))?);
    let identity = Arc::new(IdentityContext::new(config.client_id(), key_pair, Arc::clone(&broker)));
    Ok(ExchangeEngine::new(identity, broker, provider, clock).with_settings(exchange_settings(config)))
}

/// Identifiers naming the data to request.
#[derive(Debug, Clone)]
pub struct ExchangeTarget {
    /// Institution holding the data.
    pub provider_id: String,
    /// Subject of the data.
    pub data_owner_id: String,
    /// Schema of the requested data.
    pub schema_id: String,
    /// Consent relationship authorizing the exchange.
    pub relationship_id: String,
}

/// Builds exchange parameters expiring `expires_in` after `now`.
///
/// # Errors
///
/// Returns [`CliError::Usage`] when an identifier is blank, the lifetime is
/// zero, or the expiry is not representable.
pub fn exchange_params(
    target: ExchangeTarget,
    now: Timestamp,
    expires_in: Duration,
) -> CliResult<ExchangeParams> {
    for (name, value) in [
        ("provider-id", &target.provider_id),
        ("data-owner-id", &target.data_owner_id),
        ("schema-id", &target.schema_id),
        ("relationship-id", &target.relationship_id),
    ] {
        if value.trim().is_empty() {
            return Err(CliError::Usage(format!("--{name} must be non-empty")));
        }
    }
    if expires_in.is_zero() {
        return Err(CliError::Usage("--expires-in-secs must be positive".to_string()));
    }
    let expires_at = now
        .checked_add(expires_in)
        .ok_or_else(|| CliError::Usage("--expires-in-secs is out of range".to_string()))?;
    Ok(ExchangeParams {
        provider_id: InstitutionId::new(target.provider_id),
        data_owner_id: DataOwnerId::new(target.data_owner_id),
        schema_id: SchemaId::new(target.schema_id),
        relationship_id: RelationshipId::new(target.relationship_id),
        expires_at,
    })
}
