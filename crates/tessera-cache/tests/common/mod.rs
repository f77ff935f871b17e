//! Common test infrastructure for cache integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_cache::{
    CacheConnection, CacheManager, CachedRealmProvider, CachedUserProvider, ClusterBus,
    RealmStore, UserStore,
};
use tessera_config::{keys, MapScope};
use tessera_core::{RealmId, RealmModel, TesseraResult, UserId, UserModel};

type Hook = Box<dyn FnOnce() + Send>;

/// In-memory user store that counts reads and can run a hook right after a
/// read, before the caller gets to cache the result.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<UserId, UserModel>>,
    reads: AtomicUsize,
    after_read: Mutex<Option<Hook>>,
}

impl InMemoryUserStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, user: UserModel) {
        self.users.lock().insert(user.id.clone(), user);
    }

    pub fn get(&self, id: &UserId) -> Option<UserModel> {
        self.users.lock().get(id).cloned()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Runs `hook` once, right after the next read.
    pub fn after_next_read(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_read.lock() = Some(Box::new(hook));
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_user(
        &self,
        realm_id: &RealmId,
        user_id: &UserId,
    ) -> TesseraResult<Option<UserModel>> {
        let user = self
            .users
            .lock()
            .get(user_id)
            .filter(|user| user.realm_id == *realm_id)
            .cloned();
        self.reads.fetch_add(1, Ordering::SeqCst);

        let hook = self.after_read.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(user)
    }

    async fn find_user_by_username(
        &self,
        realm_id: &RealmId,
        username: &str,
    ) -> TesseraResult<Option<UserModel>> {
        Ok(self
            .users
            .lock()
            .values()
            .find(|user| user.realm_id == *realm_id && user.username == username)
            .cloned())
    }

    async fn save_user(&self, user: &UserModel) -> TesseraResult<()> {
        self.insert(user.clone());
        Ok(())
    }

    async fn delete_user(&self, realm_id: &RealmId, user_id: &UserId) -> TesseraResult<bool> {
        let mut users = self.users.lock();
        if users.get(user_id).is_some_and(|user| user.realm_id == *realm_id) {
            users.remove(user_id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_realm_users(&self, realm_id: &RealmId) -> TesseraResult<u64> {
        let mut users = self.users.lock();
        let before = users.len();
        users.retain(|_, user| user.realm_id != *realm_id);
        Ok((before - users.len()) as u64)
    }
}

/// In-memory realm store.
#[derive(Default)]
pub struct InMemoryRealmStore {
    realms: Mutex<HashMap<RealmId, RealmModel>>,
}

impl InMemoryRealmStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, realm: RealmModel) {
        self.realms.lock().insert(realm.id.clone(), realm);
    }
}

#[async_trait]
impl RealmStore for InMemoryRealmStore {
    async fn find_realm(&self, realm_id: &RealmId) -> TesseraResult<Option<RealmModel>> {
        Ok(self.realms.lock().get(realm_id).cloned())
    }

    async fn find_realm_by_name(&self, name: &str) -> TesseraResult<Option<RealmModel>> {
        Ok(self
            .realms
            .lock()
            .values()
            .find(|realm| realm.name == name)
            .cloned())
    }

    async fn save_realm(&self, realm: &RealmModel) -> TesseraResult<()> {
        self.insert(realm.clone());
        Ok(())
    }

    async fn delete_realm(&self, realm_id: &RealmId) -> TesseraResult<bool> {
        Ok(self.realms.lock().remove(realm_id).is_some())
    }
}

/// Scope for a clustered embedded container.
pub fn clustered_scope() -> MapScope {
    MapScope::new()
        .with(keys::CLUSTERED, true)
        .with(keys::ASYNC, false)
}

/// One node of a test cluster sharing stores with its peers.
pub struct TestNode {
    pub manager: CacheManager,
    pub connection: CacheConnection,
    pub users: CachedUserProvider<InMemoryUserStore>,
    pub realms: CachedRealmProvider<InMemoryRealmStore>,
}

impl TestNode {
    pub fn start(
        bus: &Arc<ClusterBus>,
        name: &str,
        users: Arc<InMemoryUserStore>,
        realms: Arc<InMemoryRealmStore>,
    ) -> Self {
        let manager = CacheManager::builder()
            .scope(clustered_scope())
            .transport(bus.join(name))
            .build();
        let connection = manager.create().expect("Failed to start cache manager");
        let users = CachedUserProvider::new(users, &connection).expect("Failed to open user cache");
        let realms =
            CachedRealmProvider::new(realms, &connection).expect("Failed to open realm cache");
        Self {
            manager,
            connection,
            users,
            realms,
        }
    }
}

pub fn user(id: &str, realm: &str, username: &str) -> UserModel {
    UserModel::new(UserId::new(id), RealmId::new(realm), username)
}
