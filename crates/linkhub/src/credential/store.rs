// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-slot, process-local linkage store.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::credential::{Linkage, LinkageSubject};
use crate::provider::Provider;

type ClearHook = Box<dyn Fn() + Send + Sync>;

/// Holds at most one [`Linkage`].
///
/// Every `clear()` bumps a generation counter. Handshakes capture the
/// generation when they begin and may only commit while it is unchanged, so a
/// response that arrives after a clear is discarded instead of resurrecting
/// the linkage.
pub struct CredentialStore {
    slot: Mutex<Option<Linkage>>,
    generation: AtomicU64,
    clear_hooks: Mutex<Vec<ClearHook>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self { slot: Mutex::new(None), generation: AtomicU64::new(0), clear_hooks: Mutex::new(vec![]) }
    }

    pub fn get(&self) -> Option<Linkage> {
        self.slot.lock().clone()
    }

    pub fn set(&self, linkage: Linkage) {
        *self.slot.lock() = Some(linkage);
    }

    /// Drop the linkage and cancel whatever attempt is in flight. Idempotent.
    pub fn clear(&self) {
        {
            // Bump under the slot lock so `commit` never sees a stale generation.
            let mut slot = self.slot.lock();
            *slot = None;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        for hook in self.clear_hooks.lock().iter() {
            hook();
        }
    }

    /// Replace the linkage with an empty one for a newly selected provider.
    pub fn select(&self, provider: Provider, subject: LinkageSubject) {
        self.clear();
        self.set(Linkage::empty(provider, subject));
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Store `linkage` only if no clear happened since `generation` was taken.
    pub fn commit(&self, generation: u64, linkage: Linkage) -> bool {
        let mut slot = self.slot.lock();
        if !self.is_current(generation) {
            return false;
        }
        *slot = Some(linkage);
        true
    }

    /// Swap in a new access token on the populated linkage for `provider`.
    ///
    /// Returns the updated linkage, or `None` if the slot was cleared, holds a
    /// different provider, or has no credentials.
    pub fn update_access_token(
        &self,
        generation: u64,
        provider: Provider,
        token: &str,
    ) -> Option<Linkage> {
        let mut slot = self.slot.lock();
        if !self.is_current(generation) {
            return None;
        }
        let linkage = slot.as_mut().filter(|l| l.provider == provider)?;
        linkage.credentials.as_mut()?.set_access_token(token);
        Some(linkage.clone())
    }

    /// Run `hook` on every `clear()`.
    pub fn on_clear(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.clear_hooks.lock().push(Box::new(hook));
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
