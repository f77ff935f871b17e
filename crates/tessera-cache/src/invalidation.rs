//! Typed snapshot caches with read-through loading and write invalidation.
//!
//! Reads consult the local cache, then load from the underlying store under a
//! [`LoadTicket`](crate::LoadTicket) so that a value read before a concurrent
//! write is never cached after that write's invalidation. Writes remove the
//! local entry first and then send the invalidation to peers; both complete
//! before the write returns.

use crate::cache::{CacheStats, NamedCache};
use crate::manager::CacheConnection;
use crate::snapshot::CachedEntity;
use crate::transport::InvalidationKind;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tessera_core::{RealmId, TesseraResult};
use tracing::debug;

/// A named cache holding snapshots of one entity type.
pub struct SnapshotCache<T> {
    cache: Arc<NamedCache>,
    connection: CacheConnection,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SnapshotCache<T> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            connection: self.connection.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: CachedEntity> SnapshotCache<T> {
    /// Opens the cache for `T` on a connection.
    pub fn new(connection: &CacheConnection) -> TesseraResult<Self> {
        Ok(Self {
            cache: connection.get_cache(T::CACHE)?,
            connection: connection.clone(),
            _marker: PhantomData,
        })
    }

    /// Returns the cached snapshot, if any.
    pub fn get(&self, id: &str) -> TesseraResult<Option<T>> {
        self.cache.get(id)
    }

    /// Returns the cached snapshot or loads and caches it.
    ///
    /// The loaded value is returned even when it could not be cached because
    /// the entry was invalidated while loading.
    pub async fn get_or_load<F, Fut>(&self, id: &str, load: F) -> TesseraResult<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TesseraResult<Option<T>>>,
    {
        if let Some(hit) = self.get(id)? {
            return Ok(Some(hit));
        }

        let ticket = self.cache.begin_load(id);
        let loaded = load().await?;
        if let Some(snapshot) = &loaded {
            self.cache
                .put_if_fresh(ticket, Some(snapshot.realm_id().clone()), snapshot)?;
        }
        Ok(loaded)
    }

    /// Removes one snapshot here and on every peer.
    pub fn invalidate(&self, id: &str) {
        self.cache.remove(id);
        self.connection.container().propagate(
            T::CACHE,
            InvalidationKind::Entity { id: id.to_string() },
        );
        debug!(cache = %T::CACHE, id = %id, "Invalidated snapshot");
    }

    /// Removes every snapshot of a realm here and on every peer.
    pub fn invalidate_realm(&self, realm_id: &RealmId) -> usize {
        let removed = self.cache.invalidate_realm(realm_id);
        self.connection.container().propagate(
            T::CACHE,
            InvalidationKind::Realm {
                realm_id: realm_id.clone(),
            },
        );
        debug!(cache = %T::CACHE, realm_id = %realm_id, removed, "Invalidated realm snapshots");
        removed
    }

    /// Removes everything here and on every peer.
    pub fn clear(&self) {
        self.cache.clear();
        self.connection
            .container()
            .propagate(T::CACHE, InvalidationKind::Clear);
    }

    /// Enables or disables the local cache. Disabling clears it.
    pub fn set_enabled(&self, enabled: bool) {
        self.cache.set_enabled(enabled);
    }

    /// Returns true if the local cache serves reads.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.cache.is_enabled()
    }

    /// Returns true if a snapshot is cached for `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.cache.contains(id)
    }

    /// Hit/miss counters of the local cache.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
