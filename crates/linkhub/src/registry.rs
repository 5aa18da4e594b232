// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider name to adapter lookup.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::IntegrationError;
use crate::provider::{AirtableAdapter, HubSpotAdapter, NotionAdapter, Provider, ProviderAdapter};

/// Maps each registered provider to its adapter, in registration order.
#[derive(Clone)]
pub struct IntegrationRegistry {
    adapters: IndexMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl IntegrationRegistry {
    /// An empty registry. Every lookup fails until adapters are registered.
    pub fn empty() -> Self {
        Self { adapters: IndexMap::new() }
    }

    /// Register an adapter, replacing any previous one for the same provider.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: Provider) -> Result<Arc<dyn ProviderAdapter>, IntegrationError> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| IntegrationError::unknown_provider(provider.display_name()))
    }

    /// Resolve a user-facing provider name (case-insensitive).
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>, IntegrationError> {
        let provider: Provider = name.parse()?;
        self.get(provider)
    }

    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.keys().copied().collect()
    }
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(NotionAdapter));
        registry.register(Arc::new(AirtableAdapter));
        registry.register(Arc::new(HubSpotAdapter));
        registry
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
