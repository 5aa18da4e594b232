// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider identities and the adapters that name their endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IntegrationError;

/// The closed set of supported integration providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    Notion,
    Airtable,
    HubSpot,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Self::Notion, Self::Airtable, Self::HubSpot];

    /// Name shown to the user when picking an integration.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Notion => "Notion",
            Self::Airtable => "Airtable",
            Self::HubSpot => "HubSpot",
        }
    }

    /// Title for the consent window.
    pub fn window_title(&self) -> String {
        format!("{} Authorization", self.display_name())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for Provider {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "notion" => Ok(Self::Notion),
            "airtable" => Ok(Self::Airtable),
            "hubspot" => Ok(Self::HubSpot),
            _ => Err(IntegrationError::unknown_provider(s)),
        }
    }
}

/// Per-provider description of endpoint naming.
///
/// The only obligation is the namespace segment `{p}` in
/// `/integrations/{p}/...`; adapters carry no business logic.
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn namespace(&self) -> &str;

    fn endpoints(&self) -> Endpoints {
        Endpoints::new(self.namespace())
    }
}

pub struct NotionAdapter;

impl ProviderAdapter for NotionAdapter {
    fn provider(&self) -> Provider {
        Provider::Notion
    }

    fn namespace(&self) -> &str {
        "notion"
    }
}

pub struct AirtableAdapter;

impl ProviderAdapter for AirtableAdapter {
    fn provider(&self) -> Provider {
        Provider::Airtable
    }

    fn namespace(&self) -> &str {
        "airtable"
    }
}

pub struct HubSpotAdapter;

impl ProviderAdapter for HubSpotAdapter {
    fn provider(&self) -> Provider {
        Provider::HubSpot
    }

    fn namespace(&self) -> &str {
        "hubspot"
    }
}

/// Request paths for one provider, relative to the service base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize: String,
    pub credentials: String,
    pub refresh: String,
    pub load: String,
}

impl Endpoints {
    pub fn new(namespace: &str) -> Self {
        let prefix = format!("/integrations/{namespace}");
        Self {
            authorize: format!("{prefix}/authorize"),
            credentials: format!("{prefix}/credentials"),
            refresh: format!("{prefix}/refresh_token"),
            load: format!("{prefix}/load"),
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
