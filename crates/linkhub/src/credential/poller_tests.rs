// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU32, Ordering};

use super::*;

/// Reports closed once it has been checked `closes_after` times.
struct CountingWindow {
    checks: AtomicU32,
    closes_after: u32,
}

impl AuthWindow for CountingWindow {
    fn is_closed(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst) + 1 >= self.closes_after
    }
}

#[tokio::test]
async fn returns_on_first_closure() {
    let window = CountingWindow { checks: AtomicU32::new(0), closes_after: 3 };
    let cancel = CancellationToken::new();

    let closed = wait_for_closure(&window, Duration::from_millis(10), &cancel).await;

    assert!(closed);
    assert_eq!(window.checks.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn first_check_waits_one_interval() {
    let window = CountingWindow { checks: AtomicU32::new(0), closes_after: 1 };
    let cancel = CancellationToken::new();
    let started = Instant::now();

    assert!(wait_for_closure(&window, Duration::from_millis(10), &cancel).await);
    assert!(started.elapsed() >= Duration::from_millis(10));
}

#[tokio::test]
async fn cancel_stops_polling() {
    let window = CountingWindow { checks: AtomicU32::new(0), closes_after: u32::MAX };
    let cancel = CancellationToken::new();

    let poll = wait_for_closure(&window, Duration::from_millis(10), &cancel);
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    };
    let (closed, ()) = tokio::join!(poll, trigger);

    assert!(!closed);
    let checks = window.checks.load(Ordering::SeqCst);
    assert!(checks <= 6, "polled {checks} times");
}
