// crates/trust-exchange-core/tests/lifecycle.rs
// ============================================================================
// Module: Request Lifecycle Tests
// Description: Polling semantics, deadlines, and snapshot validation.
// Purpose: Ensure Broker status is observed monotonically and fail-closed.
// Dependencies: trust-exchange-core, tokio
// ============================================================================

//! ## Overview
//! Drives [`RequestLifecycleManager`] directly over a scripted Broker.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeBroker;
use common::PLATFORM_SIGNATURE;
use common::PROVIDER_ENDPOINT;
use common::approved;
use common::scenario_params;
use common::scenario_request;
use common::snapshot;
use common::start_time;
use trust_exchange_core::Clock;
use trust_exchange_core::DataRequest;
use trust_exchange_core::ErrorKind;
use trust_exchange_core::ExchangeError;
use trust_exchange_core::ManualClock;
use trust_exchange_core::NewDataRequest;
use trust_exchange_core::Party;
use trust_exchange_core::RequestLifecycleManager;
use trust_exchange_core::RequestStatus;
use trust_exchange_core::StatusSnapshot;
use trust_exchange_core::Timestamp;
use trust_exchange_core::TransportError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a manager over `broker` with a manual clock at the scenario start.
fn manager(broker: FakeBroker) -> (RequestLifecycleManager, Arc<FakeBroker>, Arc<ManualClock>) {
    manager_with_clock(broker, Arc::new(ManualClock::new(start_time())))
}

/// Builds a manager over `broker` using `clock`.
fn manager_with_clock(
    broker: FakeBroker,
    clock: Arc<ManualClock>,
) -> (RequestLifecycleManager, Arc<FakeBroker>, Arc<ManualClock>) {
    let broker = Arc::new(broker);
    (RequestLifecycleManager::new(broker.clone(), clock.clone()), broker, clock)
}

/// Returns the scenario create body.
fn new_request() -> NewDataRequest {
    let params = scenario_params(start_time());
    NewDataRequest {
        provider_id: params.provider_id,
        data_owner_id: params.data_owner_id,
        schema_id: params.schema_id,
        relationship_id: params.relationship_id,
        expires_at: params.expires_at,
    }
}

/// Returns a pending scenario request.
fn pending_request() -> DataRequest {
    scenario_request(&scenario_params(start_time()))
}

/// Returns the scenario start plus `secs` seconds.
fn at(secs: u64) -> Timestamp {
    start_time().checked_add(Duration::from_secs(secs)).unwrap()
}

// ============================================================================
// SECTION: Creation
// ============================================================================

#[tokio::test]
async fn create_defaults_to_pending_when_status_missing() {
    let broker = FakeBroker::new().with_create_result(Ok(trust_exchange_core::CreatedRequest {
        request_id: "REQ9".into(),
        status: None,
    }));
    let (lifecycle, _, _) = manager(broker);
    let new = new_request();

    let request = lifecycle.create(&new).await.unwrap();

    assert_eq!(request.id.as_str(), "REQ9");
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.expires_at, new.expires_at);
}

#[tokio::test]
async fn create_refused_as_not_found_is_a_broker_rejection() {
    let broker = FakeBroker::new()
        .with_create_result(Err(TransportError::NotFound("unknown relationship".to_string())));
    let (lifecycle, _, _) = manager(broker);

    let err = lifecycle.create(&new_request()).await.unwrap_err();

    assert!(matches!(
        &err,
        ExchangeError::Rejected {
            party: Party::Broker,
            status: Some(404),
            message,
        } if message == "unknown relationship"
    ));
    assert_eq!(err.kind(), ErrorKind::Rejected);
}

// ============================================================================
// SECTION: Polling
// ============================================================================

#[tokio::test]
async fn created_pending_approved_completes_when_create_reported_no_status() {
    let broker = FakeBroker::new()
        .with_create_result(Ok(trust_exchange_core::CreatedRequest {
            request_id: "REQ1".into(),
            status: None,
        }))
        .with_statuses(vec![
            snapshot(RequestStatus::Created),
            snapshot(RequestStatus::Pending),
            approved(),
        ]);
    let (lifecycle, broker, _) = manager(broker);
    let request = lifecycle.create(&new_request()).await.unwrap();
    assert_eq!(request.status, RequestStatus::Pending);

    let approved = lifecycle
        .await_approval(&request, Duration::from_secs(1), at(30))
        .await
        .unwrap();

    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(broker.count("get_request_status"), 3);
}

#[tokio::test]
async fn in_flight_poll_past_deadline_returns_its_result() {
    let clock = Arc::new(ManualClock::new(start_time()));
    let broker = FakeBroker::new()
        .with_statuses(vec![approved()])
        .with_poll_latency(clock.clone(), Duration::from_secs(20));
    let (lifecycle, broker, clock) = manager_with_clock(broker, clock);

    let request = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), at(10))
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::Approved);
    assert!(clock.now() > at(10));
    assert_eq!(broker.count("get_request_status"), 1);
}

#[tokio::test]
async fn in_flight_poll_past_deadline_without_approval_times_out() {
    let clock = Arc::new(ManualClock::new(start_time()));
    let broker = FakeBroker::new()
        .with_statuses(vec![snapshot(RequestStatus::Pending)])
        .with_poll_latency(clock.clone(), Duration::from_secs(20));
    let (lifecycle, broker, clock) = manager_with_clock(broker, clock);

    let err = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), at(10))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(broker.count("get_request_status"), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn pending_pending_approved_returns_full_snapshot() {
    let broker = FakeBroker::new().with_statuses(vec![
        snapshot(RequestStatus::Pending),
        snapshot(RequestStatus::Pending),
        approved(),
    ]);
    let (lifecycle, broker, clock) = manager(broker);

    let request = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), at(30))
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(
        request.platform_signature.as_ref().map(|sig| sig.as_str()),
        Some(PLATFORM_SIGNATURE)
    );
    assert_eq!(request.provider_endpoint.as_deref(), Some(PROVIDER_ENDPOINT));
    assert_eq!(broker.count("get_request_status"), 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1), Duration::from_secs(1)]);
}

#[tokio::test]
async fn expired_short_circuits_without_further_polls() {
    let broker = FakeBroker::new().with_statuses(vec![
        snapshot(RequestStatus::Expired),
        approved(),
    ]);
    let (lifecycle, broker, clock) = manager(broker);

    let err = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), at(30))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExchangeError::RequestDenied {
            status: RequestStatus::Expired,
            ..
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert_eq!(broker.count("get_request_status"), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn timeout_is_not_raised_before_deadline() {
    let broker = FakeBroker::new().with_statuses(vec![snapshot(RequestStatus::Pending)]);
    let (lifecycle, broker, clock) = manager(broker);

    let err = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(4), at(10))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(clock.now() >= at(10));
    assert_eq!(clock.now(), at(10));
    assert_eq!(broker.count("get_request_status"), 3);
}

#[tokio::test]
async fn request_expiry_caps_caller_deadline() {
    let broker = FakeBroker::new().with_statuses(vec![snapshot(RequestStatus::Pending)]);
    let (lifecycle, _, clock) = manager(broker);
    let mut request = pending_request();
    request.expires_at = at(5);

    let err = lifecycle
        .await_approval(&request, Duration::from_secs(2), at(60))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(clock.now(), at(5));
}

#[tokio::test]
async fn deadline_already_passed_times_out_without_polling() {
    let (lifecycle, broker, _) = manager(FakeBroker::new());

    let err = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), start_time())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(broker.count("get_request_status"), 0);
}

#[tokio::test]
async fn regression_is_an_invariant_violation() {
    let broker = FakeBroker::new().with_statuses(vec![
        approved(),
        snapshot(RequestStatus::Pending),
    ]);
    let (lifecycle, _, _) = manager(broker);

    let err = lifecycle
        .poll_until(
            &pending_request(),
            |status| status == RequestStatus::Completed,
            Duration::from_secs(1),
            at(30),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
}

#[tokio::test]
async fn approval_without_endpoint_is_an_invariant_violation() {
    let broker = FakeBroker::new().with_statuses(vec![Ok(StatusSnapshot {
        status: RequestStatus::Approved,
        platform_signature: Some(PLATFORM_SIGNATURE.into()),
        provider_endpoint: None,
    })]);
    let (lifecycle, broker, _) = manager(broker);

    let err = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), at(30))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(broker.count("get_request_status"), 1);
}

#[tokio::test]
async fn later_approval_must_carry_its_own_grant_fields() {
    let broker = FakeBroker::new().with_statuses(vec![
        Ok(StatusSnapshot {
            status: RequestStatus::Pending,
            platform_signature: Some(PLATFORM_SIGNATURE.into()),
            provider_endpoint: Some(PROVIDER_ENDPOINT.to_string()),
        }),
        snapshot(RequestStatus::Approved),
    ]);
    let (lifecycle, broker, _) = manager(broker);

    let err = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), at(30))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert_eq!(broker.count("get_request_status"), 2);
}

#[tokio::test]
async fn completed_before_target_is_an_invariant_violation() {
    let broker = FakeBroker::new().with_statuses(vec![snapshot(RequestStatus::Completed)]);
    let (lifecycle, _, _) = manager(broker);

    let err = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), at(30))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
}

#[tokio::test]
async fn transient_status_failures_keep_polling() {
    let broker = FakeBroker::new().with_statuses(vec![
        Err(TransportError::Transient("503 service unavailable".to_string())),
        Err(TransportError::Timeout("read timed out".to_string())),
        approved(),
    ]);
    let (lifecycle, broker, _) = manager(broker);

    let request = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), at(30))
        .await
        .unwrap();

    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(broker.count("get_request_status"), 3);
}

#[tokio::test]
async fn missing_request_aborts_polling() {
    let broker = FakeBroker::new()
        .with_statuses(vec![Err(TransportError::NotFound("request REQ1".to_string())), approved()]);
    let (lifecycle, broker, _) = manager(broker);

    let err = lifecycle
        .await_approval(&pending_request(), Duration::from_secs(1), at(30))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(broker.count("get_request_status"), 1);
}
