// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a scripted integration service and a fake
//! consent window.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Router};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::client::ServiceClient;
use crate::window::{AuthWindow, WindowOpener};

/// The four service operations, keyed by their final path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Authorize,
    Credentials,
    Refresh,
    Load,
}

impl Op {
    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "authorize" => Some(Self::Authorize),
            "credentials" => Some(Self::Credentials),
            "refresh_token" => Some(Self::Refresh),
            "load" => Some(Self::Load),
            _ => None,
        }
    }
}

/// A canned response.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self { status, body: body.to_string() }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn empty(status: u16) -> Self {
        Self { status, body: String::new() }
    }
}

/// One request the mock received.
#[derive(Debug, Clone)]
pub struct Call {
    pub op: Op,
    pub namespace: String,
    pub form: HashMap<String, String>,
}

#[derive(Default)]
struct Script {
    replies: Mutex<HashMap<Op, VecDeque<Reply>>>,
    holds: Mutex<HashMap<Op, Arc<Notify>>>,
    calls: Mutex<Vec<Call>>,
    arrived: Notify,
}

impl Script {
    /// Pop the next scripted reply. The last one repeats.
    fn next_reply(&self, op: Op) -> Reply {
        let mut replies = self.replies.lock();
        match replies.get_mut(&op) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| Reply::empty(500)),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Reply::empty(500)),
            None => Reply::text(404, r#"{"detail":"Not Found"}"#),
        }
    }
}

/// Scripted stand-in for the integration service on an ephemeral port.
pub struct MockService {
    addr: SocketAddr,
    script: Arc<Script>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockService {
    pub async fn start() -> anyhow::Result<Self> {
        let script = Arc::new(Script::default());
        let app = Router::new()
            .route("/integrations/{namespace}/{op}", post(handle))
            .with_state(Arc::clone(&script));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, script, handle })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> ServiceClient {
        ServiceClient::new(&self.base_url(), Duration::from_secs(5))
    }

    /// Queue `reply` for `op`. Once the queue is down to one reply it repeats.
    pub fn reply(&self, op: Op, reply: Reply) -> &Self {
        self.script.replies.lock().entry(op).or_default().push_back(reply);
        self
    }

    /// Hold every `op` request until the returned handle is notified.
    pub fn hold(&self, op: Op) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script.holds.lock().insert(op, Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.calls.lock().clone()
    }

    pub fn calls_to(&self, op: Op) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    /// Wait until at least `n` requests for `op` have arrived.
    pub async fn wait_for_calls(&self, op: Op, n: usize) -> anyhow::Result<()> {
        let wait = async {
            loop {
                let arrived = self.script.arrived.notified();
                if self.calls_to(op).len() >= n {
                    return;
                }
                arrived.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait)
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for {n} {op:?} calls"))
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(
    State(script): State<Arc<Script>>,
    Path((namespace, segment)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, String) {
    let Some(op) = Op::from_segment(&segment) else {
        return (StatusCode::NOT_FOUND, r#"{"detail":"Not Found"}"#.to_owned());
    };

    script.calls.lock().push(Call { op, namespace, form });
    script.arrived.notify_waiters();

    let gate = script.holds.lock().get(&op).cloned();
    if let Some(gate) = gate {
        gate.notified().await;
    }

    let reply = script.next_reply(op);
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, reply.body)
}

/// Consent window closed on demand by the test.
#[derive(Clone, Default)]
pub struct FakeWindow {
    closed: Arc<AtomicBool>,
    checks: Arc<AtomicU32>,
}

impl FakeWindow {
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// How many times the closure poll has looked at this window.
    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

impl AuthWindow for FakeWindow {
    fn is_closed(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.closed.load(Ordering::SeqCst)
    }
}

/// Opener that records every window it hands out.
#[derive(Clone, Default)]
pub struct FakeOpener {
    opened: Arc<Mutex<Vec<(String, String, FakeWindow)>>>,
    fail: Arc<AtomicBool>,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next opens fail, as a blocked popup would.
    pub fn fail_opens(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    /// The most recently opened window.
    pub fn last_window(&self) -> Option<FakeWindow> {
        self.opened.lock().last().map(|(_, _, w)| w.clone())
    }

    /// URL and title of the most recently opened window.
    pub fn last_opened(&self) -> Option<(String, String)> {
        self.opened.lock().last().map(|(u, t, _)| (u.clone(), t.clone()))
    }
}

impl WindowOpener for FakeOpener {
    fn open(&self, url: &str, title: &str) -> anyhow::Result<Box<dyn AuthWindow>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("popup blocked");
        }
        let window = FakeWindow::default();
        self.opened.lock().push((url.to_owned(), title.to_owned(), window.clone()));
        Ok(Box::new(window))
    }
}

/// Poll `cond` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// Assert that an expression evaluates to `Err` whose Display output
/// contains the given substring.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
