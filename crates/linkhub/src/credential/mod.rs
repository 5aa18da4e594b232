// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account linkage: subjects, credential bundles, and the OAuth handshake.
//!
//! A [`Linkage`] ties one local subject to one provider. Credentials are
//! obtained by the [`coordinator::OAuthCoordinator`] and kept in the
//! single-slot [`store::CredentialStore`].

pub mod coordinator;
pub mod poller;
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::provider::Provider;

/// The local identity a linkage belongs to. Passed unchanged to every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkageSubject {
    pub user_id: String,
    pub org_id: String,
}

impl LinkageSubject {
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), org_id: org_id.into() }
    }

    /// Form fields identifying the subject.
    pub fn form(&self) -> [(&'static str, &str); 2] {
        [("user_id", &self.user_id), ("org_id", &self.org_id)]
    }
}

/// Opaque token payload issued by the credential service.
///
/// Only `access_token` is ever looked at; everything else is forwarded as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialBundle(Map<String, Value>);

impl CredentialBundle {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Interpret a credentials-endpoint response.
    ///
    /// `null`, `""`, `{}` and non-object bodies all count as "no credentials".
    pub fn from_response(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) if !fields.is_empty() => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.0.get("access_token").and_then(Value::as_str)
    }

    /// Replace the access token, keeping every other field.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.0.insert("access_token".to_owned(), Value::String(token.into()));
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Bundle fields merged with the subject, as sent to the load endpoint.
    pub fn with_subject(&self, subject: &LinkageSubject) -> Map<String, Value> {
        let mut merged = self.0.clone();
        merged.insert("user_id".to_owned(), Value::String(subject.user_id.clone()));
        merged.insert("org_id".to_owned(), Value::String(subject.org_id.clone()));
        merged
    }
}

/// One subject's link to one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linkage {
    pub provider: Provider,
    pub subject: LinkageSubject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialBundle>,
}

impl Linkage {
    /// A linkage for a freshly selected provider, before any handshake.
    pub fn empty(provider: Provider, subject: LinkageSubject) -> Self {
        Self { provider, subject, credentials: None }
    }

    pub fn is_populated(&self) -> bool {
        self.credentials.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Events emitted as linkages change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LinkEvent {
    /// A handshake completed and the linkage now holds credentials.
    Established { linkage: Linkage },
    /// A handshake or refresh failed.
    Failed { provider: Provider, code: String, error: String },
    /// The access token was replaced.
    Refreshed { provider: Provider },
    /// The linkage was dropped (logout or provider change).
    Cleared,
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
