// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The owner of the single linkage and the displayed record page.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::client::ServiceClient;
use crate::credential::coordinator::{AuthState, OAuthCoordinator, StartOutcome};
use crate::credential::store::CredentialStore;
use crate::credential::{CredentialBundle, LinkEvent, Linkage, LinkageSubject};
use crate::error::{ErrorCode, IntegrationError};
use crate::loader::RecordLoader;
use crate::provider::{Provider, ProviderAdapter};
use crate::record::RecordPage;
use crate::registry::IntegrationRegistry;
use crate::window::WindowOpener;

/// Observable session status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "kebab-case")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    LoadError(String),
    RateLimited,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::LoadError(_) => "load-error",
            Self::RateLimited => "rate-limited",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadError(message) => write!(f, "load-error: {message}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// UI-level operations over one linkage.
pub struct Session {
    registry: IntegrationRegistry,
    store: Arc<CredentialStore>,
    coordinator: Arc<OAuthCoordinator>,
    loader: RecordLoader,
    selected: Mutex<Option<Arc<dyn ProviderAdapter>>>,
    records: Mutex<Option<RecordPage>>,
    load_error: Mutex<Option<IntegrationError>>,
}

impl Session {
    pub fn new(
        registry: IntegrationRegistry,
        client: ServiceClient,
        opener: Arc<dyn WindowOpener>,
        poll_interval: Duration,
    ) -> Self {
        let store = Arc::new(CredentialStore::new());
        let coordinator =
            OAuthCoordinator::new(client.clone(), Arc::clone(&store), opener, poll_interval);
        Self {
            registry,
            store,
            coordinator,
            loader: RecordLoader::new(client),
            selected: Mutex::new(None),
            records: Mutex::new(None),
            load_error: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &IntegrationRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<OAuthCoordinator> {
        &self.coordinator
    }

    pub fn linkage(&self) -> Option<Linkage> {
        self.store.get()
    }

    pub fn selected(&self) -> Option<Provider> {
        self.selected.lock().as_ref().map(|a| a.provider())
    }

    pub fn records(&self) -> Option<RecordPage> {
        self.records.lock().clone()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<LinkEvent> {
        self.coordinator.subscribe()
    }

    /// Choose the provider to link. Drops any previous linkage and records.
    pub fn select(&self, name: &str, subject: LinkageSubject) -> Result<Provider, IntegrationError> {
        let adapter = self.registry.resolve(name)?;
        let provider = adapter.provider();
        self.store.select(provider, subject);
        *self.selected.lock() = Some(adapter);
        self.reset_records();
        tracing::info!(%provider, "provider selected");
        Ok(provider)
    }

    /// Point the current selection, if any, at a new subject. Drops the linkage.
    pub fn set_subject(&self, subject: LinkageSubject) {
        if let Some(provider) = self.selected() {
            self.store.select(provider, subject);
            self.reset_records();
        }
    }

    /// Start the consent handshake for the selected provider.
    pub async fn connect(&self) -> Result<StartOutcome, IntegrationError> {
        let (adapter, subject) = self.current()?;
        self.coordinator.start_authorization(adapter, subject).await
    }

    /// Replace the access token of the connected linkage.
    pub async fn refresh(&self) -> Result<CredentialBundle, IntegrationError> {
        let (adapter, subject) = self.current()?;
        self.coordinator.refresh_credentials(adapter.as_ref(), &subject).await
    }

    /// Load records. The displayed page changes only on success.
    pub async fn load(&self) -> Result<RecordPage, IntegrationError> {
        let generation = self.store.generation();
        let (adapter, subject) = self.current()?;
        let credentials = self.store.get().and_then(|l| l.credentials);
        let result = self.loader.load(adapter.as_ref(), &subject, credentials.as_ref()).await;

        if !self.store.is_current(generation) {
            tracing::debug!(provider = %adapter.provider(), "linkage cleared during load, dropping result");
            return result;
        }
        match &result {
            Ok(page) => {
                *self.records.lock() = Some(page.clone());
                *self.load_error.lock() = None;
            }
            Err(err) if err.code == ErrorCode::NotConnected => {}
            Err(err) => *self.load_error.lock() = Some(err.clone()),
        }
        result
    }

    /// Drop the displayed page.
    pub fn clear_records(&self) {
        self.reset_records();
    }

    /// Forget the linkage, cancelling any handshake in flight.
    pub fn logout(&self) {
        let provider = self.selected();
        self.store.clear();
        *self.selected.lock() = None;
        self.reset_records();
        tracing::info!(provider = ?provider, "logged out");
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.coordinator.state();
        if state.is_connecting() {
            return SessionStatus::Connecting;
        }
        let linked = self.store.get().is_some_and(|l| l.is_populated());
        if !linked {
            return SessionStatus::Disconnected;
        }
        match self.load_error.lock().as_ref() {
            Some(err) if err.is_rate_limited() => SessionStatus::RateLimited,
            Some(err) => SessionStatus::LoadError(err.message.clone()),
            None if state == AuthState::Connected || state == AuthState::RefreshRequested => {
                SessionStatus::Connected
            }
            None => SessionStatus::Disconnected,
        }
    }

    /// Selected adapter and the subject of its linkage.
    fn current(&self) -> Result<(Arc<dyn ProviderAdapter>, LinkageSubject), IntegrationError> {
        let adapter = self.selected.lock().clone().ok_or_else(no_selection)?;
        let subject = self
            .store
            .get()
            .filter(|l| l.provider == adapter.provider())
            .map(|l| l.subject)
            .ok_or_else(IntegrationError::not_connected)?;
        Ok((adapter, subject))
    }

    fn reset_records(&self) {
        *self.records.lock() = None;
        *self.load_error.lock() = None;
    }
}

fn no_selection() -> IntegrationError {
    ErrorCode::UnknownProvider.with_message("No integration selected.")
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
