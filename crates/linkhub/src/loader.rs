// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot record retrieval with the stored credentials.

use crate::client::{ServiceClient, ServiceError};
use crate::credential::{CredentialBundle, LinkageSubject};
use crate::error::{ErrorCode, IntegrationError};
use crate::provider::ProviderAdapter;
use crate::record::RecordPage;

pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again later.";
pub const LOAD_FAILED_MESSAGE: &str = "Error loading data";

/// Requests one batch of records per call. Holds no state between calls.
#[derive(Clone)]
pub struct RecordLoader {
    client: ServiceClient,
}

impl RecordLoader {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// Load a page for `adapter`'s provider.
    ///
    /// Absent or empty credentials are rejected with `NotConnected` before any
    /// request is made. A 429 is reported as `RateLimited` and not retried.
    pub async fn load(
        &self,
        adapter: &dyn ProviderAdapter,
        subject: &LinkageSubject,
        credentials: Option<&CredentialBundle>,
    ) -> Result<RecordPage, IntegrationError> {
        let provider = adapter.provider();
        let Some(credentials) = credentials.filter(|c| !c.is_empty()) else {
            return Err(IntegrationError::not_connected());
        };

        let payload = credentials.with_subject(subject);
        match self.client.load(&adapter.endpoints(), &payload).await {
            Ok(value) => {
                let page = RecordPage::from_value(value);
                tracing::info!(%provider, records = page.len(), "loaded records");
                Ok(page)
            }
            Err(ServiceError::Status { status: 429, .. }) => {
                tracing::warn!(%provider, "load rate limited");
                Err(ErrorCode::RateLimited.with_message(RATE_LIMITED_MESSAGE))
            }
            Err(e) => {
                tracing::warn!(%provider, err = %e, "load failed");
                let message = e.server_message().unwrap_or(LOAD_FAILED_MESSAGE);
                Err(ErrorCode::Load.with_message(message))
            }
        }
    }
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
