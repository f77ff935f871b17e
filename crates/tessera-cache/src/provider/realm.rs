//! Cached realm provider with a name lookup.

use crate::invalidation::SnapshotCache;
use crate::manager::CacheConnection;
use crate::snapshot::CachedRealm;
use crate::store::RealmStore;
use dashmap::DashMap;
use std::sync::Arc;
use tessera_core::{RealmId, RealmModel, TesseraResult};
use tracing::{debug, info};

/// Serves realm reads from the realm cache.
///
/// Realm names map to ids through a local lookup. A lookup entry is only
/// trusted if the snapshot it leads to still carries that name.
pub struct CachedRealmProvider<S: RealmStore> {
    store: Arc<S>,
    cache: SnapshotCache<CachedRealm>,
    names: DashMap<String, RealmId>,
}

impl<S: RealmStore> CachedRealmProvider<S> {
    pub fn new(store: Arc<S>, connection: &CacheConnection) -> TesseraResult<Self> {
        Ok(Self {
            store,
            cache: SnapshotCache::new(connection)?,
            names: DashMap::new(),
        })
    }

    #[must_use]
    pub fn cache(&self) -> &SnapshotCache<CachedRealm> {
        &self.cache
    }

    pub async fn get_realm(&self, realm_id: &RealmId) -> TesseraResult<Option<CachedRealm>> {
        let store = &self.store;
        let realm = self
            .cache
            .get_or_load(realm_id.as_str(), || async move {
                let realm = store.find_realm(realm_id).await?;
                Ok(realm.as_ref().map(CachedRealm::from_model))
            })
            .await?;

        if let Some(realm) = &realm {
            self.names.insert(realm.name().to_string(), realm.id().clone());
        }
        Ok(realm)
    }

    pub async fn get_realm_by_name(&self, name: &str) -> TesseraResult<Option<CachedRealm>> {
        let known = self.names.get(name).map(|entry| entry.value().clone());
        if let Some(realm_id) = known {
            match self.get_realm(&realm_id).await? {
                Some(realm) if realm.name() == name => return Ok(Some(realm)),
                _ => {
                    debug!(name = %name, realm_id = %realm_id, "Dropping stale realm name lookup");
                    self.names.remove_if(name, |_, id| *id == realm_id);
                }
            }
        }

        match self.store.find_realm_by_name(name).await? {
            Some(realm) => self.get_realm(&realm.id).await,
            None => Ok(None),
        }
    }

    /// Saves a realm and invalidates its snapshot and name lookup.
    pub async fn update_realm(&self, realm: &RealmModel) -> TesseraResult<()> {
        self.store.save_realm(realm).await?;
        self.evict(&realm.id);
        debug!(realm_id = %realm.id, "Realm updated");
        Ok(())
    }

    /// Deletes a realm record and invalidates its snapshot.
    pub async fn remove_realm(&self, realm_id: &RealmId) -> TesseraResult<bool> {
        let removed = self.store.delete_realm(realm_id).await?;
        self.evict(realm_id);
        if removed {
            info!(realm_id = %realm_id, "Realm removed");
        }
        Ok(removed)
    }

    /// Enables or disables realm caching. Disabling clears the cache and the
    /// name lookup.
    pub fn set_enabled(&self, enabled: bool) {
        self.cache.set_enabled(enabled);
        self.names.clear();
        info!(enabled, "Realm cache enabled flag changed");
    }

    fn evict(&self, realm_id: &RealmId) {
        self.cache.invalidate(realm_id.as_str());
        self.names.retain(|_, id| *id != *realm_id);
    }
}
