// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for integration operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    UnknownProvider,
    NotConnected,
    AuthorizationStart,
    CredentialExchange,
    Refresh,
    RateLimited,
    Load,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownProvider => "UNKNOWN_PROVIDER",
            Self::NotConnected => "NOT_CONNECTED",
            Self::AuthorizationStart => "AUTHORIZATION_START_FAILURE",
            Self::CredentialExchange => "CREDENTIAL_EXCHANGE_FAILURE",
            Self::Refresh => "REFRESH_FAILURE",
            Self::RateLimited => "RATE_LIMITED",
            Self::Load => "LOAD_FAILURE",
        }
    }

    /// Attach a human-readable message to this code.
    pub fn with_message(self, message: impl Into<String>) -> IntegrationError {
        IntegrationError { code: self, message: message.into() }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal failure of one integration operation.
///
/// None of these are fatal: the coordinator is always left in a state from
/// which the user can re-trigger the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationError {
    pub code: ErrorCode,
    pub message: String,
}

impl IntegrationError {
    pub fn unknown_provider(name: &str) -> Self {
        ErrorCode::UnknownProvider.with_message(format!("Unsupported integration type: {name}"))
    }

    pub fn not_connected() -> Self {
        ErrorCode::NotConnected.with_message("No linked credentials. Connect first.")
    }

    pub fn is_rate_limited(&self) -> bool {
        self.code == ErrorCode::RateLimited
    }
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for IntegrationError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
