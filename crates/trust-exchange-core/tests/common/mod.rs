// crates/trust-exchange-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Scripted Broker and Provider fakes plus scenario builders.
// Purpose: Drive exchanges deterministically without network access.
// Dependencies: trust-exchange-core, serde_json
// ============================================================================

//! ## Overview
//! [`FakeBroker`] replays a scripted sequence of status snapshots and records
//! every call. [`FakeProvider`] answers with a fixed signed envelope. Both
//! pair with [`ManualClock`] so polling never sleeps for real.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use trust_exchange_core::BrokerTransport;
use trust_exchange_core::CreatedRequest;
use trust_exchange_core::DataRequest;
use trust_exchange_core::EncodedSignature;
use trust_exchange_core::ExchangeEngine;
use trust_exchange_core::ExchangeObserver;
use trust_exchange_core::ExchangeParams;
use trust_exchange_core::ExchangeSettings;
use trust_exchange_core::ExchangeStepEvent;
use trust_exchange_core::FieldMapping;
use trust_exchange_core::FinalStatus;
use trust_exchange_core::IdentityContext;
use trust_exchange_core::Institution;
use trust_exchange_core::InstitutionId;
use trust_exchange_core::KeyPair;
use trust_exchange_core::ManualClock;
use trust_exchange_core::NewDataRequest;
use trust_exchange_core::ProviderDataEnvelope;
use trust_exchange_core::ProviderDataRequest;
use trust_exchange_core::ProviderTransport;
use trust_exchange_core::PublicKey;
use trust_exchange_core::RequestId;
use trust_exchange_core::RequestStatus;
use trust_exchange_core::RequesterSignatureSubmission;
use trust_exchange_core::SignatureService;
use trust_exchange_core::StatusSnapshot;
use trust_exchange_core::Timestamp;
use trust_exchange_core::TransportError;
use trust_exchange_core::verification_fields;

// ============================================================================
// SECTION: Scenario Constants
// ============================================================================

/// Requester institution identifier.
pub const REQUESTER_ID: &str = "REQUESTER-1";
/// Provider institution identifier.
pub const PROVIDER_ID: &str = "P1";
/// Data owner identifier.
pub const DATA_OWNER_ID: &str = "D1";
/// Schema identifier.
pub const SCHEMA_ID: &str = "S1";
/// Relationship identifier.
pub const RELATIONSHIP_ID: &str = "R1";
/// Broker-assigned request identifier.
pub const REQUEST_ID: &str = "REQ1";
/// Broker authorization signature.
pub const PLATFORM_SIGNATURE: &str = "sig-plat-1";
/// Approved provider endpoint.
pub const PROVIDER_ENDPOINT: &str = "https://provider/x";
/// Scenario start time.
pub const START: &str = "2025-08-05T10:00:00.000Z";

/// Returns the requester key pair.
pub fn requester_keys() -> KeyPair {
    KeyPair::from_secret_bytes(&[1u8; 32])
}

/// Returns the provider key pair.
pub fn provider_keys() -> KeyPair {
    KeyPair::from_secret_bytes(&[2u8; 32])
}

/// Returns the Broker key pair.
pub fn platform_keys() -> KeyPair {
    KeyPair::from_secret_bytes(&[3u8; 32])
}

/// Returns the scenario start timestamp.
pub fn start_time() -> Timestamp {
    Timestamp::parse(START).unwrap()
}

/// Returns exchange parameters expiring one hour after `now`.
pub fn scenario_params(now: Timestamp) -> ExchangeParams {
    ExchangeParams {
        provider_id: PROVIDER_ID.into(),
        data_owner_id: DATA_OWNER_ID.into(),
        schema_id: SCHEMA_ID.into(),
        relationship_id: RELATIONSHIP_ID.into(),
        expires_at: now.checked_add(Duration::from_secs(3_600)).unwrap(),
    }
}

/// Returns the request the Broker creates for `params`.
pub fn scenario_request(params: &ExchangeParams) -> DataRequest {
    DataRequest::from_created(
        &NewDataRequest {
            provider_id: params.provider_id.clone(),
            data_owner_id: params.data_owner_id.clone(),
            schema_id: params.schema_id.clone(),
            relationship_id: params.relationship_id.clone(),
            expires_at: params.expires_at,
        },
        CreatedRequest {
            request_id: REQUEST_ID.into(),
            status: Some(RequestStatus::Pending),
        },
    )
}

/// Returns a status snapshot without grant fields.
pub fn snapshot(status: RequestStatus) -> Result<StatusSnapshot, TransportError> {
    Ok(StatusSnapshot {
        status,
        platform_signature: None,
        provider_endpoint: None,
    })
}

/// Returns a complete `APPROVED` snapshot.
pub fn approved() -> Result<StatusSnapshot, TransportError> {
    Ok(StatusSnapshot {
        status: RequestStatus::Approved,
        platform_signature: Some(PLATFORM_SIGNATURE.into()),
        provider_endpoint: Some(PROVIDER_ENDPOINT.to_string()),
    })
}

/// Builds an institution record.
pub fn institution(id: &str, key: PublicKey) -> Institution {
    Institution {
        id: id.into(),
        name: Some(format!("{id} institution")),
        public_key: key,
        metadata: BTreeMap::new(),
    }
}

// ============================================================================
// SECTION: Fake Broker
// ============================================================================

/// Scripted Broker that records every call.
pub struct FakeBroker {
    /// Institution returned for the caller.
    me: Institution,
    /// Broker public key.
    platform_key: PublicKey,
    /// Directory entries.
    directory: HashMap<InstitutionId, Institution>,
    /// Response to create calls.
    create_result: Mutex<Result<CreatedRequest, TransportError>>,
    /// Scripted status responses; the last one repeats.
    statuses: Mutex<VecDeque<Result<StatusSnapshot, TransportError>>>,
    /// Response to final submission.
    final_status: FinalStatus,
    /// Operation names in call order.
    calls: Mutex<Vec<&'static str>>,
    /// Create bodies received.
    created: Mutex<Vec<NewDataRequest>>,
    /// Submissions received.
    submissions: Mutex<Vec<RequesterSignatureSubmission>>,
    /// Clock moved forward while each status call is in flight.
    poll_latency: Option<(Arc<ManualClock>, Duration)>,
}

impl FakeBroker {
    /// Creates a Broker that approves on the first poll.
    pub fn new() -> Self {
        let mut directory: HashMap<InstitutionId, Institution> = HashMap::new();
        directory.insert(PROVIDER_ID.into(), institution(PROVIDER_ID, provider_keys().public_key()));
        directory
            .insert(REQUESTER_ID.into(), institution(REQUESTER_ID, requester_keys().public_key()));
        let mut extra = BTreeMap::new();
        extra.insert("completedAt".to_string(), Value::from("2025-08-05T10:00:05.000Z"));
        Self {
            me: institution(REQUESTER_ID, requester_keys().public_key()),
            platform_key: platform_keys().public_key(),
            directory,
            create_result: Mutex::new(Ok(CreatedRequest {
                request_id: REQUEST_ID.into(),
                status: Some(RequestStatus::Pending),
            })),
            statuses: Mutex::new(VecDeque::from([approved()])),
            final_status: FinalStatus {
                status: "COMPLETED".to_string(),
                extra,
            },
            calls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            poll_latency: None,
        }
    }

    /// Advances `clock` by `latency` during every status call.
    pub fn with_poll_latency(mut self, clock: Arc<ManualClock>, latency: Duration) -> Self {
        self.poll_latency = Some((clock, latency));
        self
    }

    /// Replaces the status script.
    pub fn with_statuses(self, statuses: Vec<Result<StatusSnapshot, TransportError>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    /// Replaces the create response.
    pub fn with_create_result(self, result: Result<CreatedRequest, TransportError>) -> Self {
        *self.create_result.lock().unwrap() = result;
        self
    }

    /// Replaces the institution returned for the caller.
    pub fn with_me(mut self, me: Institution) -> Self {
        self.me = me;
        self
    }

    /// Replaces or adds a directory entry.
    pub fn with_institution(mut self, entry: Institution) -> Self {
        self.directory.insert(entry.id.clone(), entry);
        self
    }

    /// Stores `entry` under `key`, even when the identifiers differ.
    pub fn with_directory_entry(mut self, key: &str, entry: Institution) -> Self {
        self.directory.insert(key.into(), entry);
        self
    }

    /// Returns the operations called so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns how many times `operation` was called.
    pub fn count(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| **call == operation).count()
    }

    /// Returns create bodies received.
    pub fn created(&self) -> Vec<NewDataRequest> {
        self.created.lock().unwrap().clone()
    }

    /// Returns submissions received.
    pub fn submissions(&self) -> Vec<RequesterSignatureSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    /// Returns the final status the Broker reports.
    pub fn final_status(&self) -> FinalStatus {
        self.final_status.clone()
    }

    /// Records a call.
    fn record(&self, operation: &'static str) {
        self.calls.lock().unwrap().push(operation);
    }
}

#[async_trait]
impl BrokerTransport for FakeBroker {
    async fn get_my_institution(&self) -> Result<Institution, TransportError> {
        self.record("get_my_institution");
        Ok(self.me.clone())
    }

    async fn get_public_key(&self) -> Result<PublicKey, TransportError> {
        self.record("get_public_key");
        Ok(self.platform_key.clone())
    }

    async fn create_data_request(
        &self,
        request: &NewDataRequest,
    ) -> Result<CreatedRequest, TransportError> {
        self.record("create_data_request");
        self.created.lock().unwrap().push(request.clone());
        self.create_result.lock().unwrap().clone()
    }

    async fn get_request_status(
        &self,
        _request_id: &RequestId,
    ) -> Result<StatusSnapshot, TransportError> {
        self.record("get_request_status");
        if let Some((clock, latency)) = &self.poll_latency {
            clock.advance(*latency);
        }
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            statuses.front().cloned().unwrap()
        }
    }

    async fn get_institution_by_id(
        &self,
        institution_id: &InstitutionId,
    ) -> Result<Institution, TransportError> {
        self.record("get_institution_by_id");
        self.directory
            .get(institution_id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(format!("institution {institution_id}")))
    }

    async fn submit_requester_signature(
        &self,
        submission: &RequesterSignatureSubmission,
    ) -> Result<FinalStatus, TransportError> {
        self.record("submit_requester_signature");
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(self.final_status.clone())
    }
}

// ============================================================================
// SECTION: Fake Provider
// ============================================================================

/// Provider answering every request with one envelope.
pub struct FakeProvider {
    /// Response envelope.
    response: Result<ProviderDataEnvelope, TransportError>,
    /// Requests received with their endpoint.
    requests: Mutex<Vec<(String, ProviderDataRequest)>>,
}

impl FakeProvider {
    /// Creates a Provider returning `response`.
    pub fn new(response: Result<ProviderDataEnvelope, TransportError>) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a Provider that signs the verification payload of `request`.
    pub fn honest(request: &DataRequest) -> Self {
        let signature = provider_sign(verification_fields(&REQUESTER_ID.into(), request));
        Self::new(Ok(ProviderDataEnvelope {
            payload: sample_payload(),
            signature,
        }))
    }

    /// Returns requests received.
    pub fn requests(&self) -> Vec<(String, ProviderDataRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderTransport for FakeProvider {
    async fn request_data(
        &self,
        endpoint: &str,
        request: &ProviderDataRequest,
    ) -> Result<ProviderDataEnvelope, TransportError> {
        self.requests.lock().unwrap().push((endpoint.to_string(), request.clone()));
        self.response.clone()
    }
}

/// Returns the data payload served by the fake Provider.
pub fn sample_payload() -> Value {
    json!({"accountBalance": 1250.5, "currency": "EUR"})
}

/// Signs `fields` as the Provider.
pub fn provider_sign(fields: FieldMapping) -> EncodedSignature {
    let identity =
        Arc::new(IdentityContext::new(PROVIDER_ID.into(), provider_keys(), Arc::new(FakeBroker::new())));
    SignatureService::new(identity).sign(fields).unwrap().signature
}

// ============================================================================
// SECTION: Observer
// ============================================================================

/// Observer that keeps every event.
#[derive(Default)]
pub struct RecordingObserver {
    /// Events in arrival order.
    events: Mutex<Vec<ExchangeStepEvent>>,
}

impl RecordingObserver {
    /// Returns recorded events.
    pub fn events(&self) -> Vec<ExchangeStepEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ExchangeObserver for RecordingObserver {
    fn record_step(&self, event: ExchangeStepEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ============================================================================
// SECTION: Engine Helpers
// ============================================================================

/// Test harness bundling an engine with its fakes.
pub struct Harness {
    /// Engine under test.
    pub engine: ExchangeEngine,
    /// Scripted Broker.
    pub broker: Arc<FakeBroker>,
    /// Scripted Provider.
    pub provider: Arc<FakeProvider>,
    /// Manual clock.
    pub clock: Arc<ManualClock>,
    /// Step observer.
    pub observer: Arc<RecordingObserver>,
}

/// Builds a harness with a 2s poll interval and 60s approval timeout.
pub fn harness(broker: FakeBroker, provider: FakeProvider) -> Harness {
    harness_with_settings(
        broker,
        provider,
        ExchangeSettings {
            poll_interval: Duration::from_secs(2),
            approval_timeout: Duration::from_secs(60),
        },
    )
}

/// Builds a harness with explicit polling settings.
pub fn harness_with_settings(
    broker: FakeBroker,
    provider: FakeProvider,
    settings: ExchangeSettings,
) -> Harness {
    let broker = Arc::new(broker);
    let provider = Arc::new(provider);
    let clock = Arc::new(ManualClock::new(start_time()));
    let observer = Arc::new(RecordingObserver::default());
    let identity =
        Arc::new(IdentityContext::new(REQUESTER_ID.into(), requester_keys(), broker.clone()));
    let engine = ExchangeEngine::new(identity, broker.clone(), provider.clone(), clock.clone())
        .with_observer(observer.clone())
        .with_settings(settings);
    Harness {
        engine,
        broker,
        provider,
        clock,
        observer,
    }
}
