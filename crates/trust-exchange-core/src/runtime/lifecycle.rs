// crates/trust-exchange-core/src/runtime/lifecycle.rs
// ============================================================================
// Module: Request Lifecycle Manager
// Description: Request creation and deadline-bounded status polling.
// Purpose: Track a Broker-owned request through its lifecycle without ever
//          advancing its state locally.
// Dependencies: tracing, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The manager registers requests with the Broker and polls their status at a
//! fixed interval against an absolute deadline. Every snapshot is checked
//! before it is accepted:
//! - statuses observed from the Broker never move backwards along the
//!   lifecycle;
//! - `REJECTED` and `EXPIRED` end polling immediately;
//! - an `APPROVED` snapshot must carry the platform signature and the
//!   provider endpoint;
//! - `COMPLETED` while the caller is still waiting for something else is a
//!   protocol violation.
//!
//! Status reads that fail transiently are logged and retried at the next
//! interval; the deadline alone bounds how long that may go on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::error::ExchangeError;
use crate::core::error::Party;
use crate::core::identifiers::RequestId;
use crate::core::request::DataRequest;
use crate::core::request::NewDataRequest;
use crate::core::request::RequestStatus;
use crate::core::request::StatusSnapshot;
use crate::core::time::Timestamp;
use crate::interfaces::BrokerTransport;
use crate::interfaces::Clock;
use crate::interfaces::TransportError;

// ============================================================================
// SECTION: Lifecycle Manager
// ============================================================================

/// Creates requests and waits for their status to reach a target.
#[derive(Clone)]
pub struct RequestLifecycleManager {
    /// Broker owning the requests.
    broker: Arc<dyn BrokerTransport>,
    /// Time source for deadlines and poll spacing.
    clock: Arc<dyn Clock>,
}

impl RequestLifecycleManager {
    /// Creates a manager over `broker` using `clock`.
    #[must_use]
    pub fn new(broker: Arc<dyn BrokerTransport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            broker,
            clock,
        }
    }

    /// Registers a new request with the Broker.
    ///
    /// The initial status is whatever the Broker reports, `PENDING` when it
    /// reports none.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Rejected`] when the Broker refuses the request,
    /// including a 404 for an unknown relationship or institution, and other [`ExchangeError`] variants when the call fails.
    pub async fn create(&self, new: &NewDataRequest) -> Result<DataRequest, ExchangeError> {
        let created = self.broker.create_data_request(new).await.map_err(|err| match err {
            TransportError::NotFound(message) => ExchangeError::Rejected {
                party: Party::Broker,
                status: Some(404),
                message,
            },
            other => ExchangeError::from_broker(other),
        })?;
        let request = DataRequest::from_created(new, created);
        info!(
            request_id = %request.id,
            provider_id = %request.provider_id,
            status = %request.status,
            expires_at = %request.expires_at,
            "data request created"
        );
        Ok(request)
    }

    /// Polls until the status is `APPROVED`.
    ///
    /// # Errors
    ///
    /// See [`RequestLifecycleManager::poll_until`].
    pub async fn await_approval(
        &self,
        request: &DataRequest,
        poll_interval: Duration,
        deadline: Timestamp,
    ) -> Result<DataRequest, ExchangeError> {
        self.poll_until(request, |status| status == RequestStatus::Approved, poll_interval, deadline)
            .await
    }

    /// Polls the Broker every `poll_interval` until `predicate` accepts the
    /// observed status.
    ///
    /// The effective deadline is the earlier of `deadline` and the request's
    /// own expiry. A call already in flight when the deadline passes is
    /// allowed to finish.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::RequestDenied`] on `REJECTED` or `EXPIRED`.
    /// - [`ExchangeError::Timeout`] once the deadline has passed.
    /// - [`ExchangeError::InvariantViolation`] on a status regression, an
    ///   incomplete approval, or `COMPLETED` before the predicate held.
    /// - Any non-transient Broker failure.
    pub async fn poll_until(
        &self,
        request: &DataRequest,
        predicate: impl Fn(RequestStatus) -> bool + Send + Sync,
        poll_interval: Duration,
        deadline: Timestamp,
    ) -> Result<DataRequest, ExchangeError> {
        let effective_deadline = deadline.min(request.expires_at);
        let mut current = request.clone();
        let mut observed: Option<RequestStatus> = None;
        let mut polls: u32 = 0;
        loop {
            let now = self.clock.now();
            if now >= effective_deadline {
                return Err(ExchangeError::Timeout(format!(
                    "request {} still {} at deadline {effective_deadline} after {polls} polls",
                    current.id, current.status
                )));
            }
            polls = polls.saturating_add(1);
            match self.broker.get_request_status(&current.id).await {
                Ok(snapshot) => {
                    debug!(request_id = %current.id, status = %snapshot.status, polls, "status polled");
                    if let Some(previous) = observed
                        && previous.is_regression_to(snapshot.status)
                    {
                        return Err(ExchangeError::InvariantViolation(format!(
                            "request {} regressed from {previous} to {}",
                            current.id, snapshot.status
                        )));
                    }
                    check_snapshot(&current.id, &snapshot)?;
                    observed = Some(snapshot.status);
                    let next = current.with_snapshot(snapshot);
                    if next.status != current.status {
                        info!(
                            request_id = %next.id,
                            from = %current.status,
                            to = %next.status,
                            "request status changed"
                        );
                    }
                    if predicate(next.status) {
                        return Ok(next);
                    }
                    if next.status == RequestStatus::Completed {
                        return Err(ExchangeError::InvariantViolation(format!(
                            "request {} completed before the awaited status was observed",
                            next.id
                        )));
                    }
                    current = next;
                }
                Err(err) if err.is_retryable() => {
                    warn!(request_id = %current.id, polls, error = %err, "status poll failed; continuing");
                }
                Err(err) => return Err(ExchangeError::from_broker(err)),
            }
            let remaining = self.clock.now().duration_until(effective_deadline);
            if remaining.is_zero() {
                continue;
            }
            self.clock.sleep(poll_interval.min(remaining)).await;
        }
    }
}

/// Rejects denied snapshots and approvals missing their grant fields.
///
/// Checks the snapshot as reported, before earlier grant fields are merged in.
fn check_snapshot(request_id: &RequestId, snapshot: &StatusSnapshot) -> Result<(), ExchangeError> {
    if snapshot.status.is_denied() {
        return Err(ExchangeError::RequestDenied {
            request_id: request_id.clone(),
            status: snapshot.status,
        });
    }
    if snapshot.status == RequestStatus::Approved {
        if snapshot.platform_signature.is_none() {
            return Err(ExchangeError::InvariantViolation(format!(
                "request {request_id} approved without a platform signature"
            )));
        }
        if snapshot.provider_endpoint.is_none() {
            return Err(ExchangeError::InvariantViolation(format!(
                "request {request_id} approved without a provider endpoint"
            )));
        }
    }
    Ok(())
}
