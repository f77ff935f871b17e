//! Named cache handles.
//!
//! Entries are stored as serialized JSON so a cached value can never alias a
//! live model. Invalidations leave a tombstone sequence behind while loads are
//! in flight; a load whose ticket predates the tombstone is not cached.

use crate::topology::{CacheName, CacheTopology};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tessera_core::{RealmId, TesseraResult};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    realm_id: Option<RealmId>,
    payload: Arc<str>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    sequence: u64,
    key_tombstones: HashMap<String, u64>,
    realm_tombstones: HashMap<RealmId, u64>,
    cleared_at: u64,
    pending_loads: usize,
}

impl CacheState {
    fn is_stale(&self, key: &str, realm_id: Option<&RealmId>, ticket_sequence: u64) -> bool {
        if self.cleared_at > ticket_sequence {
            return true;
        }
        if self
            .key_tombstones
            .get(key)
            .is_some_and(|seq| *seq > ticket_sequence)
        {
            return true;
        }
        realm_id
            .and_then(|realm| self.realm_tombstones.get(realm))
            .is_some_and(|seq| *seq > ticket_sequence)
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

/// Hit and miss counters of one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Reads served from the cache.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
    /// Entries currently held.
    pub entries: usize,
}

/// A named cache on a container.
#[derive(Debug)]
pub struct NamedCache {
    topology: CacheTopology,
    state: RwLock<CacheState>,
    enabled: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Proof that a read-through load started at a given point.
///
/// Obtain one with [`NamedCache::begin_load`] before reading the underlying
/// store and hand it to [`NamedCache::put_if_fresh`] afterwards. Dropping it
/// without storing abandons the load.
#[derive(Debug)]
pub struct LoadTicket<'a> {
    cache: &'a NamedCache,
    key: String,
    sequence: u64,
}

impl LoadTicket<'_> {
    /// Key being loaded.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LoadTicket<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state.write();
        state.pending_loads = state.pending_loads.saturating_sub(1);
        if state.pending_loads == 0 {
            state.key_tombstones.clear();
            state.realm_tombstones.clear();
        }
    }
}

impl NamedCache {
    /// Creates an empty cache with the given definition.
    #[must_use]
    pub fn new(topology: CacheTopology) -> Self {
        Self {
            topology,
            state: RwLock::new(CacheState::default()),
            enabled: AtomicBool::new(true),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Name of this cache.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.topology.name
    }

    /// Definition this cache was created with.
    #[must_use]
    pub fn topology(&self) -> &CacheTopology {
        &self.topology
    }

    /// Returns the raw payload stored under a key.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<Arc<str>> {
        if !self.is_enabled() {
            return None;
        }
        let found = self
            .state
            .read()
            .entries
            .get(key)
            .map(|entry| Arc::clone(&entry.payload));
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache = %self.name(), key = %key, "Cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(cache = %self.name(), key = %key, "Cache miss");
        }
        found
    }

    /// Stores a raw payload unconditionally.
    pub fn put_raw(&self, key: impl Into<String>, realm_id: Option<RealmId>, payload: Arc<str>) {
        if !self.is_enabled() {
            return;
        }
        self.state
            .write()
            .entries
            .insert(key.into(), CacheEntry { realm_id, payload });
    }

    /// Deserializes the value stored under a key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> TesseraResult<Option<T>> {
        match self.get_raw(key) {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Serializes and stores a value unconditionally.
    pub fn put<T: Serialize>(
        &self,
        key: impl Into<String>,
        realm_id: Option<RealmId>,
        value: &T,
    ) -> TesseraResult<()> {
        let payload: Arc<str> = serde_json::to_string(value)?.into();
        self.put_raw(key, realm_id, payload);
        Ok(())
    }

    /// Starts a read-through load of `key`.
    #[must_use]
    pub fn begin_load(&self, key: impl Into<String>) -> LoadTicket<'_> {
        let mut state = self.state.write();
        state.pending_loads += 1;
        LoadTicket {
            cache: self,
            key: key.into(),
            sequence: state.sequence,
        }
    }

    /// Stores a loaded value unless the key or its realm was invalidated
    /// after the ticket was taken.
    ///
    /// An entry already present is kept. Returns true if the value was stored.
    pub fn put_if_fresh<T: Serialize>(
        &self,
        ticket: LoadTicket<'_>,
        realm_id: Option<RealmId>,
        value: &T,
    ) -> TesseraResult<bool> {
        let payload: Arc<str> = serde_json::to_string(value)?.into();
        let stored = {
            let mut state = self.state.write();
            if !self.is_enabled()
                || state.entries.contains_key(&ticket.key)
                || state.is_stale(&ticket.key, realm_id.as_ref(), ticket.sequence)
            {
                false
            } else {
                state
                    .entries
                    .insert(ticket.key.clone(), CacheEntry { realm_id, payload });
                true
            }
        };
        if !stored {
            debug!(cache = %self.name(), key = %ticket.key, "Skipped caching loaded value");
        }
        drop(ticket);
        Ok(stored)
    }

    /// Removes one entry. Returns true if an entry was present.
    pub fn remove(&self, key: &str) -> bool {
        let mut state = self.state.write();
        let removed = state.entries.remove(key).is_some();
        if state.pending_loads > 0 {
            let seq = state.next_sequence();
            state.key_tombstones.insert(key.to_string(), seq);
        }
        removed
    }

    /// Removes every entry scoped to a realm. Returns the number removed.
    pub fn invalidate_realm(&self, realm_id: &RealmId) -> usize {
        let mut state = self.state.write();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| entry.realm_id.as_ref() != Some(realm_id));
        if state.pending_loads > 0 {
            let seq = state.next_sequence();
            state.realm_tombstones.insert(realm_id.clone(), seq);
        }
        before - state.entries.len()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        let seq = state.next_sequence();
        state.cleared_at = seq;
    }

    /// Enables or disables the cache. Disabling clears it and bypasses all
    /// reads and writes until re-enabled.
    pub fn set_enabled(&self, enabled: bool) {
        self.clear();
        self.enabled.store(enabled, Ordering::Release);
        debug!(cache = %self.name(), enabled, "Cache enabled flag changed");
    }

    /// Returns true if the cache serves reads.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Returns true if an entry exists for the key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.state.read().entries.contains_key(key)
    }

    /// Number of entries held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Returns true if the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
