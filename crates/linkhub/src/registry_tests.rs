// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ErrorCode;

#[test]
fn default_registers_all_providers_in_order() {
    let registry = IntegrationRegistry::default();
    assert_eq!(registry.providers(), vec![Provider::Notion, Provider::Airtable, Provider::HubSpot]);
}

#[test]
fn resolve_is_case_insensitive() -> anyhow::Result<()> {
    let registry = IntegrationRegistry::default();
    let adapter = registry.resolve("airtable")?;
    assert_eq!(adapter.provider(), Provider::Airtable);
    assert_eq!(adapter.namespace(), "airtable");
    Ok(())
}

#[test]
fn resolve_unknown_name_fails() {
    let registry = IntegrationRegistry::default();
    let err = registry.resolve("Dropbox").err().map(|e| e.code);
    assert_eq!(err, Some(ErrorCode::UnknownProvider));
}

#[test]
fn unregistered_provider_is_rejected() {
    let mut registry = IntegrationRegistry::empty();
    registry.register(Arc::new(NotionAdapter));

    assert!(registry.get(Provider::Notion).is_ok());
    let err = registry.get(Provider::HubSpot).err().map(|e| e.code);
    assert_eq!(err, Some(ErrorCode::UnknownProvider));
}
