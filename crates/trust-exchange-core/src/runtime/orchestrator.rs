// crates/trust-exchange-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Exchange Orchestrator
// Description: End-to-end driver for a single trust-mediated data exchange.
// Purpose: Sequence creation, approval, provider retrieval, verification, and
//          final submission with fail-closed signature checks.
// Dependencies: serde, serde_json, tracing, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`ExchangeEngine`] bundles the shared collaborators (identity, transports,
//! clock, observer) and is cheap to clone. Each call to
//! [`ExchangeEngine::run`] drives one [`ExchangeOrchestrator`] through eight
//! steps:
//!
//! 1. resolve self institution and the Broker key,
//! 2. create the request,
//! 3. wait for approval,
//! 4. sign the authorization payload,
//! 5. fetch from the Provider,
//! 6. resolve the Provider key,
//! 7. verify the Provider signature,
//! 8. re-sign and submit to the Broker.
//!
//! Invariants:
//! - Step 8 never runs unless step 7 verified.
//! - The verification payload is built from the request as created, never
//!   from values echoed by the Provider.
//!
//! Security posture: Provider payloads are untrusted until verified; the
//! Broker signature is forwarded as issued and never re-encoded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::canonical::FieldMapping;
use crate::core::canonical::payload_digest;
use crate::core::error::ExchangeError;
use crate::core::error::ExchangeFailure;
use crate::core::error::ExchangeStep;
use crate::core::identifiers::DataOwnerId;
use crate::core::identifiers::InstitutionId;
use crate::core::identifiers::RelationshipId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::SchemaId;
use crate::core::keys::EncodedSignature;
use crate::core::request::DataRequest;
use crate::core::request::FinalStatus;
use crate::core::request::NewDataRequest;
use crate::core::request::ProviderDataRequest;
use crate::core::request::RequesterSignatureSubmission;
use crate::core::time::Timestamp;
use crate::interfaces::BrokerTransport;
use crate::interfaces::Clock;
use crate::interfaces::ProviderTransport;
use crate::runtime::identity::IdentityContext;
use crate::runtime::lifecycle::RequestLifecycleManager;
use crate::runtime::observer::ExchangeObserver;
use crate::runtime::observer::ExchangeStepEvent;
use crate::runtime::observer::NoopObserver;
use crate::runtime::observer::StepOutcome;
use crate::runtime::signing::SignatureService;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default spacing between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default time allowed for the Broker to approve a request.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Polling settings applied to every exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeSettings {
    /// Spacing between status polls.
    pub poll_interval: Duration,
    /// Time allowed for approval, measured from the start of step 3.
    pub approval_timeout: Duration,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }
}

/// Inputs of a single exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeParams {
    /// Institution holding the data.
    pub provider_id: InstitutionId,
    /// Consenting data owner.
    pub data_owner_id: DataOwnerId,
    /// Requested data schema.
    pub schema_id: SchemaId,
    /// Consent relationship authorizing the exchange.
    pub relationship_id: RelationshipId,
    /// Absolute expiry of the request.
    pub expires_at: Timestamp,
}

/// Result of a completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeOutcome {
    /// Request identifier.
    pub request_id: RequestId,
    /// Provider that served the data.
    pub provider_id: InstitutionId,
    /// Verified Provider payload.
    pub payload: Value,
    /// Provider signature over the verification payload.
    pub provider_signature: EncodedSignature,
    /// Requester signature submitted to the Broker.
    pub requester_signature: EncodedSignature,
    /// Broker status after submission, as reported.
    pub final_status: FinalStatus,
}

// ============================================================================
// SECTION: Exchange Engine
// ============================================================================

/// Shared collaborators for running exchanges.
///
/// # Invariants
/// - Clones share the same identity cache and transports.
#[derive(Clone)]
pub struct ExchangeEngine {
    /// Local identity and directory cache.
    identity: Arc<IdentityContext>,
    /// Signing and verification.
    signatures: SignatureService,
    /// Request creation and polling.
    lifecycle: RequestLifecycleManager,
    /// Broker transport.
    broker: Arc<dyn BrokerTransport>,
    /// Provider transport.
    provider: Arc<dyn ProviderTransport>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Step telemetry sink.
    observer: Arc<dyn ExchangeObserver>,
    /// Polling settings.
    settings: ExchangeSettings,
}

impl ExchangeEngine {
    /// Creates an engine with default settings and no observer.
    #[must_use]
    pub fn new(
        identity: Arc<IdentityContext>,
        broker: Arc<dyn BrokerTransport>,
        provider: Arc<dyn ProviderTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            signatures: SignatureService::new(Arc::clone(&identity)),
            lifecycle: RequestLifecycleManager::new(Arc::clone(&broker), Arc::clone(&clock)),
            identity,
            broker,
            provider,
            clock,
            observer: Arc::new(NoopObserver),
            settings: ExchangeSettings::default(),
        }
    }

    /// Replaces the step observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ExchangeObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the polling settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ExchangeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the identity context.
    #[must_use]
    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    /// Returns the signature service.
    #[must_use]
    pub const fn signatures(&self) -> &SignatureService {
        &self.signatures
    }

    /// Returns the lifecycle manager.
    #[must_use]
    pub const fn lifecycle(&self) -> &RequestLifecycleManager {
        &self.lifecycle
    }

    /// Runs one exchange to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeFailure`] naming the step that failed.
    pub async fn run(&self, params: ExchangeParams) -> Result<ExchangeOutcome, ExchangeFailure> {
        ExchangeOrchestrator::new(self).run(params).await
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Per-exchange driver.
///
/// # Invariants
/// - Used for exactly one exchange.
pub struct ExchangeOrchestrator<'a> {
    /// Shared collaborators.
    engine: &'a ExchangeEngine,
    /// Request identifier, once the Broker has assigned one.
    request_id: Option<RequestId>,
}

impl<'a> ExchangeOrchestrator<'a> {
    /// Creates a driver for one exchange.
    #[must_use]
    pub const fn new(engine: &'a ExchangeEngine) -> Self {
        Self {
            engine,
            request_id: None,
        }
    }

    /// Runs all steps in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeFailure`] naming the step that failed.
    pub async fn run(mut self, params: ExchangeParams) -> Result<ExchangeOutcome, ExchangeFailure> {
        let engine = self.engine;
        let requester_id = engine.identity.self_id().clone();

        self.step(ExchangeStep::ResolveIdentity, async {
            let me = engine.identity.my_institution().await?;
            engine.identity.platform_public_key().await?;
            info!(institution_id = %me.id, "resolved self institution and platform key");
            Ok(())
        })
        .await?;

        let new_request = NewDataRequest {
            provider_id: params.provider_id,
            data_owner_id: params.data_owner_id,
            schema_id: params.schema_id,
            relationship_id: params.relationship_id,
            expires_at: params.expires_at,
        };
        let created = self
            .step(ExchangeStep::CreateRequest, engine.lifecycle.create(&new_request))
            .await?;
        self.request_id = Some(created.id.clone());

        let approved = self
            .step(ExchangeStep::AwaitApproval, async {
                let deadline = engine
                    .clock
                    .now()
                    .checked_add(engine.settings.approval_timeout)
                    .unwrap_or(created.expires_at);
                engine
                    .lifecycle
                    .await_approval(&created, engine.settings.poll_interval, deadline)
                    .await
            })
            .await?;
        let (platform_signature, provider_endpoint) = self.approval_grant(&approved)?;

        let authorization = self
            .step(ExchangeStep::SignAuthorization, async {
                engine.signatures.sign(authorization_fields(
                    &requester_id,
                    &platform_signature,
                    &approved.id,
                ))
            })
            .await?;

        let envelope = self
            .step(ExchangeStep::FetchFromProvider, async {
                let request = ProviderDataRequest {
                    request_id: approved.id.clone(),
                    requester_id: requester_id.clone(),
                    platform_signature: platform_signature.clone(),
                    requester_signature: authorization.signature.clone(),
                };
                engine
                    .provider
                    .request_data(&provider_endpoint, &request)
                    .await
                    .map_err(ExchangeError::from_provider)
            })
            .await?;

        let provider = self
            .step(ExchangeStep::ResolveProviderKey, engine.identity.institution(&approved.provider_id))
            .await?;

        let verification = verification_fields(&requester_id, &approved);
        self.step(ExchangeStep::VerifyProviderSignature, async {
            if !engine.signatures.verify(&verification, &envelope.signature, &provider.public_key) {
                return Err(ExchangeError::UntrustedResponse(format!(
                    "provider {} signature does not verify for request {}",
                    provider.id, approved.id
                )));
            }
            if let Ok(digest) = payload_digest(&verification) {
                debug!(request_id = %approved.id, payload_digest = %digest, "provider signature verified");
            }
            Ok(())
        })
        .await?;

        let (requester_signature, final_status) = self
            .step(ExchangeStep::SubmitFinalSignature, async {
                let signed = engine.signatures.sign(verification.clone())?;
                let submission = RequesterSignatureSubmission {
                    request_id: approved.id.clone(),
                    provider_id: approved.provider_id.clone(),
                    provider_signature: envelope.signature.clone(),
                    platform_signature: platform_signature.clone(),
                    requester_signature: signed.signature.clone(),
                };
                let status = engine
                    .broker
                    .submit_requester_signature(&submission)
                    .await
                    .map_err(ExchangeError::from_broker)?;
                Ok((signed.signature, status))
            })
            .await?;

        info!(request_id = %approved.id, final_status = %final_status.status, "exchange finished");
        Ok(ExchangeOutcome {
            request_id: approved.id,
            provider_id: approved.provider_id,
            payload: envelope.payload,
            provider_signature: envelope.signature,
            requester_signature,
            final_status,
        })
    }

    /// Runs one step, reporting its outcome and latency.
    async fn step<T>(
        &self,
        step: ExchangeStep,
        work: impl Future<Output = Result<T, ExchangeError>>,
    ) -> Result<T, ExchangeFailure> {
        let started = self.engine.clock.now();
        let result = work.await;
        let latency = started.duration_until(self.engine.clock.now());
        let outcome = match &result {
            Ok(_) => StepOutcome::Ok,
            Err(err) => StepOutcome::Error(err.kind()),
        };
        debug!(
            step = %step,
            outcome = outcome.as_str(),
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "exchange step finished"
        );
        self.engine.observer.record_step(ExchangeStepEvent {
            request_id: self.request_id.clone(),
            step,
            outcome,
            latency,
        });
        result.map_err(|err| {
            warn!(
                step = %step,
                kind = %err.kind(),
                request_id = self.request_id.as_ref().map(RequestId::as_str),
                error = %err,
                "exchange step failed"
            );
            ExchangeFailure::new(step, err)
        })
    }

    /// Extracts the grant fields from an approved request.
    fn approval_grant(
        &self,
        approved: &DataRequest,
    ) -> Result<(EncodedSignature, String), ExchangeFailure> {
        match (&approved.platform_signature, &approved.provider_endpoint) {
            (Some(signature), Some(endpoint)) => Ok((signature.clone(), endpoint.clone())),
            _ => Err(ExchangeFailure::new(
                ExchangeStep::AwaitApproval,
                ExchangeError::InvariantViolation(format!(
                    "request {} approved without grant fields",
                    self.request_id.as_ref().unwrap_or(&approved.id)
                )),
            )),
        }
    }
}

// ============================================================================
// SECTION: Payloads
// ============================================================================

/// Builds the payload the requester signs before contacting the Provider.
#[must_use]
pub fn authorization_fields(
    requester_id: &InstitutionId,
    platform_signature: &EncodedSignature,
    request_id: &RequestId,
) -> FieldMapping {
    FieldMapping::new()
        .with("requesterId", requester_id.as_str())
        .with("platformSignature", platform_signature.as_str())
        .with("requestId", request_id.as_str())
}

/// Builds the payload the Provider signs and the requester countersigns.
#[must_use]
pub fn verification_fields(requester_id: &InstitutionId, request: &DataRequest) -> FieldMapping {
    FieldMapping::new()
        .with("requesterId", requester_id.as_str())
        .with("providerId", request.provider_id.as_str())
        .with("dataOwnerId", request.data_owner_id.as_str())
        .with("relationshipId", request.relationship_id.as_str())
        .with("expiresAt", request.expires_at.to_canonical_string())
}
