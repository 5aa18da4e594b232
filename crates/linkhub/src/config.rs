// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::credential::LinkageSubject;
use crate::provider::Provider;

/// Link third-party accounts and load their records.
#[derive(Debug, Clone, Parser)]
#[command(name = "linkhub", version, about)]
pub struct Config {
    /// Base URL of the integration service.
    #[arg(long, default_value = "http://localhost:8000", env = "LINKHUB_BASE_URL")]
    pub base_url: String,

    /// User the linkage belongs to.
    #[arg(long, default_value = "TestUser", env = "LINKHUB_USER_ID")]
    pub user_id: String,

    /// Organization the linkage belongs to.
    #[arg(long, default_value = "TestOrg", env = "LINKHUB_ORG_ID")]
    pub org_id: String,

    /// Provider to select at startup (Notion, Airtable, HubSpot).
    #[arg(long, env = "LINKHUB_PROVIDER")]
    pub provider: Option<String>,

    /// Consent window closure poll interval in milliseconds.
    #[arg(long, default_value_t = 200, env = "LINKHUB_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30, env = "LINKHUB_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    /// Browser launch command (shell command via `sh -c`, `{url}` is replaced
    /// with the consent URL). Without it the URL is printed and `done` closes
    /// the window.
    #[arg(long, env = "LINKHUB_BROWSER")]
    pub browser: Option<String>,

    /// Log format (json or text).
    #[arg(long, env = "LINKHUB_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LINKHUB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid --base-url {:?}: {e}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("--base-url must be http or https, got {}", url.scheme());
        }

        if self.poll_interval_ms == 0 {
            anyhow::bail!("--poll-interval-ms must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("--request-timeout-secs must be greater than zero");
        }

        self.initial_provider()?;

        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("--log-format must be json or text, got {}", self.log_format);
        }
        Ok(())
    }

    pub fn initial_provider(&self) -> anyhow::Result<Option<Provider>> {
        match &self.provider {
            Some(name) => Ok(Some(name.parse()?)),
            None => Ok(None),
        }
    }

    pub fn subject(&self) -> LinkageSubject {
        LinkageSubject::new(&self.user_id, &self.org_id)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
