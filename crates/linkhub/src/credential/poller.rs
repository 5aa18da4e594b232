// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closure poll for consent windows.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::window::AuthWindow;

/// Check `window` every `interval` until it is closed or `cancel` fires.
///
/// Returns `true` on the first observed closure and `false` if cancelled.
/// The timer lives only inside this call, so it stops exactly once either way.
pub async fn wait_for_closure(
    window: &dyn AuthWindow,
    interval: Duration,
    cancel: &CancellationToken,
) -> bool {
    let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = timer.tick() => {}
        }

        if window.is_closed() {
            return true;
        }
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
