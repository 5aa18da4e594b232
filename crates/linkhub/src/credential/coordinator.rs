// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth connection coordinator: drives the consent-window handshake and
//! token refresh for the single active linkage.
//!
//! ```text
//! Idle ─▶ AuthorizationRequested ─▶ AuthorizationWindowOpen ─▶ PollingForClosure
//!   ▲                                                                 │
//!   │ clear()                                                         ▼
//!   └──────────── Failed ◀─────────────────────────────── ExchangingCredentials
//!                                                                     │
//!                  RefreshRequested ◀──▶ Connected ◀──────────────────┘
//! ```
//!
//! Every attempt is stamped with the store generation at the time it began.
//! A transition only happens while that generation is still current, so
//! `CredentialStore::clear()` both stops the closure poll and turns any late
//! response into a no-op.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::client::{ServiceClient, ServiceError};
use crate::credential::poller::wait_for_closure;
use crate::credential::store::CredentialStore;
use crate::credential::{CredentialBundle, LinkEvent, Linkage, LinkageSubject};
use crate::error::{ErrorCode, IntegrationError};
use crate::provider::{Endpoints, Provider, ProviderAdapter};
use crate::window::{AuthWindow, WindowOpener};

/// Handshake state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Idle,
    AuthorizationRequested,
    AuthorizationWindowOpen,
    PollingForClosure,
    ExchangingCredentials,
    Connected,
    RefreshRequested,
    Failed,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AuthorizationRequested => "authorization_requested",
            Self::AuthorizationWindowOpen => "authorization_window_open",
            Self::PollingForClosure => "polling_for_closure",
            Self::ExchangingCredentials => "exchanging_credentials",
            Self::Connected => "connected",
            Self::RefreshRequested => "refresh_requested",
            Self::Failed => "failed",
        }
    }

    /// Whether a new handshake may begin from this state.
    pub fn accepts_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Failed)
    }

    /// A handshake is between its first request and its outcome.
    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            Self::AuthorizationRequested
                | Self::AuthorizationWindowOpen
                | Self::PollingForClosure
                | Self::ExchangingCredentials
        )
    }

    /// Resting states: nothing is in flight.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Idle | Self::Connected | Self::Failed)
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`OAuthCoordinator::start_authorization`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The window is open and the closure poll is running.
    Started,
    /// Another handshake (or a live connection) already owns the coordinator.
    Ignored(AuthState),
    /// The linkage was cleared before the window could be opened.
    Cancelled,
}

type EstablishedHook = Arc<dyn Fn(&Linkage) + Send + Sync>;

/// The in-flight handshake.
struct Attempt {
    provider: Provider,
    generation: u64,
    cancel: CancellationToken,
}

pub struct OAuthCoordinator {
    client: ServiceClient,
    store: Arc<CredentialStore>,
    opener: Arc<dyn WindowOpener>,
    poll_interval: Duration,
    state: watch::Sender<AuthState>,
    attempt: Mutex<Option<Attempt>>,
    last_error: Mutex<Option<IntegrationError>>,
    on_established: Mutex<Option<EstablishedHook>>,
    event_tx: broadcast::Sender<LinkEvent>,
}

impl OAuthCoordinator {
    /// Create a coordinator bound to `store`. Clearing the store cancels any
    /// handshake this coordinator has in flight.
    pub fn new(
        client: ServiceClient,
        store: Arc<CredentialStore>,
        opener: Arc<dyn WindowOpener>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::Idle);
        let (event_tx, _) = broadcast::channel(64);
        let coordinator = Arc::new(Self {
            client,
            store: Arc::clone(&store),
            opener,
            poll_interval,
            state,
            attempt: Mutex::new(None),
            last_error: Mutex::new(None),
            on_established: Mutex::new(None),
            event_tx,
        });

        let weak: Weak<Self> = Arc::downgrade(&coordinator);
        store.on_clear(move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.reset();
            }
        });
        coordinator
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Wait until nothing is in flight and return the resting state.
    pub async fn wait_settled(&self) -> AuthState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(AuthState::is_settled).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        settled
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.event_tx.subscribe()
    }

    /// Register the callback run each time a handshake populates the linkage.
    pub fn on_linkage_established(&self, hook: impl Fn(&Linkage) + Send + Sync + 'static) {
        *self.on_established.lock() = Some(Arc::new(hook));
    }

    /// The failure that ended the most recent handshake or refresh.
    pub fn last_error(&self) -> Option<IntegrationError> {
        self.last_error.lock().clone()
    }

    /// Provider of the handshake currently in flight.
    pub fn pending_provider(&self) -> Option<Provider> {
        self.attempt.lock().as_ref().map(|a| a.provider)
    }

    /// Begin the consent handshake for `adapter`'s provider.
    ///
    /// Returns once the consent window is open; the closure poll and the
    /// credential exchange continue in the background. Ignored unless the
    /// coordinator is `Idle` or `Failed`.
    pub async fn start_authorization(
        self: &Arc<Self>,
        adapter: Arc<dyn ProviderAdapter>,
        subject: LinkageSubject,
    ) -> Result<StartOutcome, IntegrationError> {
        let provider = adapter.provider();
        let cancel = CancellationToken::new();

        // Claim under the attempt lock so a concurrent clear either lands
        // before the generation is read or cancels this attempt afterwards.
        let generation = {
            let mut attempt = self.attempt.lock();
            let state = self.state();
            if !state.accepts_start() {
                tracing::debug!(%provider, %state, "authorization already in progress, ignoring");
                return Ok(StartOutcome::Ignored(state));
            }
            let generation = self.store.generation();
            *attempt = Some(Attempt { provider, generation, cancel: cancel.clone() });
            self.state.send_replace(AuthState::AuthorizationRequested);
            generation
        };
        *self.last_error.lock() = None;
        tracing::info!(%provider, user_id = %subject.user_id, org_id = %subject.org_id, "starting authorization");

        let endpoints = adapter.endpoints();
        let url = match self.client.authorize(&endpoints, &subject).await {
            Ok(url) => url,
            Err(e) => {
                let err = failure(ErrorCode::AuthorizationStart, provider, &e);
                tracing::warn!(%provider, err = %e, "authorization request failed");
                return self.fail(generation, provider, err);
            }
        };

        if !self.is_current(generation) {
            return Ok(StartOutcome::Cancelled);
        }

        let window = match self.opener.open(&url, &provider.window_title()) {
            Ok(window) => window,
            Err(e) => {
                tracing::warn!(%provider, err = %e, "failed to open consent window");
                let err = ErrorCode::AuthorizationStart
                    .with_message(format!("Failed to open {provider} authorization window: {e}"));
                return self.fail(generation, provider, err);
            }
        };

        if !self.advance(generation, AuthState::AuthorizationWindowOpen)
            || !self.advance(generation, AuthState::PollingForClosure)
        {
            return Ok(StartOutcome::Cancelled);
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.complete_handshake(provider, endpoints, subject, window, generation, cancel).await;
        });

        Ok(StartOutcome::Started)
    }

    /// Poll for window closure, then exchange for credentials.
    async fn complete_handshake(
        &self,
        provider: Provider,
        endpoints: Endpoints,
        subject: LinkageSubject,
        window: Box<dyn AuthWindow>,
        generation: u64,
        cancel: CancellationToken,
    ) {
        if !wait_for_closure(window.as_ref(), self.poll_interval, &cancel).await {
            tracing::debug!(%provider, "closure poll cancelled");
            return;
        }
        drop(window);

        if !self.advance(generation, AuthState::ExchangingCredentials) {
            return;
        }
        tracing::info!(%provider, "consent window closed, retrieving credentials");

        let bundle = match self.client.credentials(&endpoints, &subject).await {
            Ok(Some(bundle)) => bundle,
            Ok(None) => {
                tracing::warn!(%provider, "credential service returned no credentials");
                let err = ErrorCode::CredentialExchange
                    .with_message(format!("Failed to retrieve {provider} credentials."));
                let _ = self.fail(generation, provider, err);
                return;
            }
            Err(e) => {
                tracing::warn!(%provider, err = %e, "credential retrieval failed");
                let err = failure(ErrorCode::CredentialExchange, provider, &e);
                let _ = self.fail(generation, provider, err);
                return;
            }
        };

        let linkage = Linkage { provider, subject, credentials: Some(bundle) };
        if !self.store.commit(generation, linkage.clone()) {
            tracing::info!(%provider, "linkage cleared during exchange, discarding credentials");
            return;
        }
        if !self.finish(generation, AuthState::Connected) {
            return;
        }

        tracing::info!(%provider, "linkage established");
        let hook = self.on_established.lock().clone();
        if let Some(hook) = hook {
            hook(&linkage);
        }
        let _ = self.event_tx.send(LinkEvent::Established { linkage });
    }

    /// Replace the access token of the connected linkage.
    ///
    /// On failure the stored credentials are left exactly as they were and the
    /// coordinator goes back to `Connected`.
    pub async fn refresh_credentials(
        &self,
        adapter: &dyn ProviderAdapter,
        subject: &LinkageSubject,
    ) -> Result<CredentialBundle, IntegrationError> {
        let provider = adapter.provider();
        let generation = self.store.generation();

        let linked = self.store.get().is_some_and(|l| l.provider == provider && l.is_populated());
        if !linked {
            return Err(IntegrationError::not_connected());
        }

        let mut current = AuthState::Connected;
        let claimed = self.state.send_if_modified(|state| {
            current = *state;
            if *state == AuthState::Connected {
                *state = AuthState::RefreshRequested;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(match current {
                AuthState::RefreshRequested => {
                    ErrorCode::Refresh.with_message("A token refresh is already in progress.")
                }
                _ => IntegrationError::not_connected(),
            });
        }
        tracing::info!(%provider, "refreshing access token");

        let result = self.client.refresh(&adapter.endpoints(), subject).await;
        let outcome = match result {
            Ok(token) => match self.store.update_access_token(generation, provider, &token) {
                Some(linkage) => Ok(linkage.credentials.unwrap_or_default()),
                None => Err(ErrorCode::Refresh.with_message(format!(
                    "{provider} linkage was cleared during refresh."
                ))),
            },
            Err(e) => {
                tracing::warn!(%provider, err = %e, "token refresh failed");
                Err(failure(ErrorCode::Refresh, provider, &e))
            }
        };

        self.state.send_if_modified(|state| {
            if *state == AuthState::RefreshRequested && self.store.is_current(generation) {
                *state = AuthState::Connected;
                true
            } else {
                false
            }
        });

        match &outcome {
            Ok(_) => {
                tracing::info!(%provider, "access token refreshed");
                let _ = self.event_tx.send(LinkEvent::Refreshed { provider });
            }
            Err(_) if !self.store.is_current(generation) => {
                tracing::debug!(%provider, "linkage cleared during refresh, dropping failure");
            }
            Err(err) => self.record_failure(provider, err),
        }
        outcome
    }

    /// Forget the in-flight attempt and return to `Idle`. Run on store clear.
    fn reset(&self) {
        let mut attempt = self.attempt.lock();
        if let Some(previous) = attempt.take() {
            previous.cancel.cancel();
            tracing::debug!(provider = %previous.provider, "cancelled in-flight authorization");
        }
        self.state.send_replace(AuthState::Idle);
        drop(attempt);
        let _ = self.event_tx.send(LinkEvent::Cleared);
    }

    fn is_current(&self, generation: u64) -> bool {
        let attempt = self.attempt.lock();
        Self::owns(&attempt, generation) && self.store.is_current(generation)
    }

    fn owns(attempt: &Option<Attempt>, generation: u64) -> bool {
        attempt.as_ref().is_some_and(|a| a.generation == generation && !a.cancel.is_cancelled())
    }

    /// Move to `next` if the attempt stamped `generation` is still live.
    fn advance(&self, generation: u64, next: AuthState) -> bool {
        let attempt = self.attempt.lock();
        if !(Self::owns(&attempt, generation) && self.store.is_current(generation)) {
            tracing::debug!(state = %next, "stale attempt, skipping transition");
            return false;
        }
        self.state.send_replace(next);
        true
    }

    /// Like [`Self::advance`], but also ends the attempt.
    fn finish(&self, generation: u64, next: AuthState) -> bool {
        let mut attempt = self.attempt.lock();
        if !(Self::owns(&attempt, generation) && self.store.is_current(generation)) {
            return false;
        }
        *attempt = None;
        self.state.send_replace(next);
        true
    }

    fn fail(
        &self,
        generation: u64,
        provider: Provider,
        err: IntegrationError,
    ) -> Result<StartOutcome, IntegrationError> {
        if !self.finish(generation, AuthState::Failed) {
            return Ok(StartOutcome::Cancelled);
        }
        self.record_failure(provider, &err);
        Err(err)
    }

    fn record_failure(&self, provider: Provider, err: &IntegrationError) {
        *self.last_error.lock() = Some(err.clone());
        let _ = self.event_tx.send(LinkEvent::Failed {
            provider,
            code: err.code.as_str().to_owned(),
            error: err.message.clone(),
        });
    }
}

/// Map a service error to the user-facing failure for `code`, preferring the
/// service's own message.
fn failure(code: ErrorCode, provider: Provider, err: &ServiceError) -> IntegrationError {
    let message = match err.server_message() {
        Some(m) => m.to_owned(),
        None => match code {
            ErrorCode::AuthorizationStart => format!("Failed to start {provider} authorization."),
            ErrorCode::CredentialExchange => format!("Failed to retrieve {provider} credentials."),
            ErrorCode::Refresh => format!("Failed to refresh {provider} access token."),
            _ => err.to_string(),
        },
    };
    code.with_message(message)
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
