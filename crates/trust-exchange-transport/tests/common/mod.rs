// crates/trust-exchange-transport/tests/common/mod.rs
// ============================================================================
// Module: Scripted HTTP Server
// Description: In-process axum server replaying scripted responses.
// Purpose: Exercise the HTTP transports against real sockets.
// Dependencies: axum, tokio, trust-exchange-core
// ============================================================================

//! ## Overview
//! [`spawn_scripted_server`] answers every method and path with the next
//! scripted [`Reply`] (the last one repeats) and records each request it
//! receives, headers and body included.

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

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::AUTHORIZATION;
use serde_json::Value;
use tokio::sync::oneshot;
use trust_exchange_core::KeyPair;
use trust_exchange_core::ManualClock;
use trust_exchange_core::Timestamp;
use trust_exchange_transport::RetryPolicy;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// One scripted response.
#[derive(Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn json(status: StatusCode, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn ok(body: &Value) -> Self {
        Self::json(StatusCode::OK, body)
    }

    pub fn raw(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub client_id: Option<String>,
    pub authorization: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body json")
    }
}

struct ServerState {
    replies: Mutex<VecDeque<Reply>>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

async fn scripted_handler(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header = |name: &str| {
        headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
    };
    state.recorded.lock().expect("recorded lock").push(Recorded {
        method,
        path: uri.path().to_string(),
        client_id: header("x-client-id"),
        authorization: header(AUTHORIZATION.as_str()),
        body,
    });
    let reply = {
        let mut replies = state.replies.lock().expect("replies lock");
        if replies.len() > 1 {
            replies.pop_front().expect("scripted reply")
        } else {
            replies.front().cloned().expect("scripted reply")
        }
    };
    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }
    (reply.status, reply.body)
}

/// Running scripted server.
pub struct ScriptedServer {
    pub base_url: String,
    pub recorded: Arc<Mutex<Vec<Recorded>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ScriptedServer {
    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().expect("recorded lock").clone()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub async fn spawn_scripted_server(replies: Vec<Reply>) -> ScriptedServer {
    assert!(!replies.is_empty(), "at least one reply required");
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let state = Arc::new(ServerState {
        replies: Mutex::new(replies.into()),
        recorded: Arc::clone(&recorded),
    });
    let app = Router::new().fallback(scripted_handler).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    ScriptedServer {
        base_url: format!("http://{addr}"),
        recorded,
        shutdown: Some(shutdown_tx),
    }
}

/// Returns a loopback URL nothing is listening on.
pub async fn refused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Timestamp::parse("2025-08-05T10:00:00.000Z").expect("start")))
}

/// Three attempts, fixed 10ms spacing, no jitter.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(10), 1.0).with_jitter(0.0)
}

pub fn public_key_base64(seed: u8) -> String {
    KeyPair::from_secret_bytes(&[seed; 32]).public_key().to_base64()
}
