// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the external credential/integration service.

use std::fmt;
use std::sync::Once;
use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};

use crate::credential::{CredentialBundle, LinkageSubject};
use crate::provider::Endpoints;

/// Failure talking to the integration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The request never produced a response (connect, timeout, body read).
    Transport(String),
    /// The service answered with a non-2xx status.
    Status { status: u16, message: Option<String> },
    /// A 2xx body that could not be interpreted.
    Decode(String),
}

impl ServiceError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The message the service put in its error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Status { status, message: Some(m) } => write!(f, "status {status}: {m}"),
            Self::Status { status, message: None } => write!(f, "status {status}"),
            Self::Decode(e) => write!(f, "invalid response body: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Form-posting client for the `/integrations/{p}/...` endpoints.
#[derive(Clone)]
pub struct ServiceClient {
    base_url: String,
    client: Client,
}

impl ServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        ensure_crypto_provider();
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a form and return the raw success body.
    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<String, ServiceError> {
        let resp = self.client.post(self.url(path)).form(form).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message: extract_message(&text),
            });
        }
        Ok(text)
    }

    /// Ask the service for the provider's consent URL.
    pub async fn authorize(
        &self,
        endpoints: &Endpoints,
        subject: &LinkageSubject,
    ) -> Result<String, ServiceError> {
        let text = self.post_form(&endpoints.authorize, &subject.form()).await?;
        // The URL comes back as a JSON string, but accept bare text too.
        let url = match serde_json::from_str::<Value>(&text) {
            Ok(Value::String(s)) => s,
            Ok(other) => {
                return Err(ServiceError::Decode(format!("expected a URL string, got {other}")))
            }
            Err(_) => text.trim().to_owned(),
        };
        if url.is_empty() {
            return Err(ServiceError::Decode("empty authorization URL".to_owned()));
        }
        Ok(url)
    }

    /// Fetch whatever credentials the service stored during consent.
    ///
    /// `Ok(None)` means the service answered but had nothing to give.
    pub async fn credentials(
        &self,
        endpoints: &Endpoints,
        subject: &LinkageSubject,
    ) -> Result<Option<CredentialBundle>, ServiceError> {
        let text = self.post_form(&endpoints.credentials, &subject.form()).await?;
        Ok(CredentialBundle::from_response(decode_json(&text)?))
    }

    /// Request a new access token.
    pub async fn refresh(
        &self,
        endpoints: &Endpoints,
        subject: &LinkageSubject,
    ) -> Result<String, ServiceError> {
        let text = self.post_form(&endpoints.refresh, &subject.form()).await?;
        let value = decode_json(&text)?;
        value
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .ok_or_else(|| ServiceError::Decode("no access_token in refresh response".to_owned()))
    }

    /// Load one page of records. `payload` is sent JSON-encoded in the
    /// `credentials` form field.
    pub async fn load(
        &self,
        endpoints: &Endpoints,
        payload: &Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        let encoded = serde_json::to_string(payload)
            .map_err(|e| ServiceError::Decode(format!("encode credentials: {e}")))?;
        let text = self.post_form(&endpoints.load, &[("credentials", &encoded)]).await?;
        decode_json(&text)
    }
}

static CRYPTO_INIT: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
pub fn ensure_crypto_provider() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Parse a success body. Empty bodies decode to `null`.
fn decode_json(text: &str) -> Result<Value, ServiceError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| ServiceError::Decode(e.to_string()))
}

/// Pull a human-readable message out of an error body.
///
/// Checks `detail`, `message` and `error` in that order, then falls back to
/// the body text itself.
pub fn extract_message(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => ["detail", "message", "error"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(|v| match v {
                Value::String(s) => (!s.is_empty()).then(|| s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            }),
        Ok(Value::String(s)) => (!s.is_empty()).then_some(s),
        Ok(Value::Null) => None,
        _ => Some(trimmed.to_owned()),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
