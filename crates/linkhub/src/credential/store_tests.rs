// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::credential::CredentialBundle;

fn populated(provider: Provider, token: &str) -> Linkage {
    Linkage {
        provider,
        subject: LinkageSubject::new("u1", "o1"),
        credentials: CredentialBundle::from_response(json!({
            "access_token": token,
            "refresh_token": "r1",
        })),
    }
}

#[test]
fn new_store_is_empty() {
    let store = CredentialStore::new();
    assert!(store.get().is_none());
}

#[test]
fn clear_then_get_is_absent() {
    let store = CredentialStore::new();
    store.set(populated(Provider::Notion, "tok"));
    store.clear();
    assert!(store.get().is_none());
}

#[test]
fn clear_is_idempotent() {
    let store = CredentialStore::new();
    store.clear();
    store.clear();
    assert!(store.get().is_none());
    assert_eq!(store.generation(), 2);
}

#[test]
fn clear_runs_hooks_every_time() {
    let store = CredentialStore::new();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    store.on_clear(move || {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    store.clear();
    store.clear();
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn select_creates_empty_linkage() {
    let store = CredentialStore::new();
    store.set(populated(Provider::Notion, "tok"));

    store.select(Provider::Airtable, LinkageSubject::new("u2", "o2"));

    let linkage = store.get().expect("linkage");
    assert_eq!(linkage.provider, Provider::Airtable);
    assert_eq!(linkage.subject, LinkageSubject::new("u2", "o2"));
    assert!(linkage.credentials.is_none());
}

#[test]
fn commit_with_current_generation_stores() {
    let store = CredentialStore::new();
    let generation = store.generation();
    assert!(store.commit(generation, populated(Provider::Notion, "tok")));
    let creds = store.get().and_then(|l| l.credentials).expect("credentials");
    assert_eq!(creds.access_token(), Some("tok"));
}

#[test]
fn commit_after_clear_is_discarded() {
    let store = CredentialStore::new();
    let generation = store.generation();
    store.clear();
    assert!(!store.commit(generation, populated(Provider::Notion, "stale")));
    assert!(store.get().is_none());
}

#[test]
fn update_access_token_replaces_only_token() {
    let store = CredentialStore::new();
    store.set(populated(Provider::HubSpot, "old"));

    let updated = store.update_access_token(store.generation(), Provider::HubSpot, "new");
    let updated = updated.expect("updated linkage");
    let creds = updated.credentials.expect("credentials");
    assert_eq!(creds.access_token(), Some("new"));
    assert_eq!(creds.fields().get("refresh_token"), Some(&json!("r1")));
    assert_eq!(updated.subject, LinkageSubject::new("u1", "o1"));
}

#[test]
fn update_access_token_ignores_other_provider() {
    let store = CredentialStore::new();
    store.set(populated(Provider::Notion, "old"));

    assert!(store.update_access_token(store.generation(), Provider::HubSpot, "new").is_none());
    let creds = store.get().and_then(|l| l.credentials).expect("credentials");
    assert_eq!(creds.access_token(), Some("old"));
}

#[test]
fn update_access_token_after_clear_is_discarded() {
    let store = CredentialStore::new();
    store.set(populated(Provider::Notion, "old"));
    let generation = store.generation();
    store.clear();
    store.set(populated(Provider::Notion, "other"));

    assert!(store.update_access_token(generation, Provider::Notion, "new").is_none());
    let creds = store.get().and_then(|l| l.credentials).expect("credentials");
    assert_eq!(creds.access_token(), Some("other"));
}
