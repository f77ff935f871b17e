//! Cached user provider.

use crate::invalidation::SnapshotCache;
use crate::manager::CacheConnection;
use crate::snapshot::CachedUser;
use crate::store::UserStore;
use std::sync::Arc;
use tessera_core::{CredentialValue, RealmId, TesseraError, TesseraResult, UserId, UserModel};
use tracing::{debug, info};

/// Serves user reads from the user cache and invalidates on every write.
pub struct CachedUserProvider<S: UserStore> {
    store: Arc<S>,
    cache: SnapshotCache<CachedUser>,
}

impl<S: UserStore> CachedUserProvider<S> {
    /// Creates a provider over a store and the connection's user cache.
    pub fn new(store: Arc<S>, connection: &CacheConnection) -> TesseraResult<Self> {
        Ok(Self {
            store,
            cache: SnapshotCache::new(connection)?,
        })
    }

    /// The underlying user cache.
    #[must_use]
    pub fn cache(&self) -> &SnapshotCache<CachedUser> {
        &self.cache
    }

    /// Returns a user snapshot, loading it from the store on a miss.
    pub async fn get_user(
        &self,
        realm_id: &RealmId,
        user_id: &UserId,
    ) -> TesseraResult<Option<CachedUser>> {
        let store = &self.store;
        let snapshot = self
            .cache
            .get_or_load(user_id.as_str(), || async move {
                let user = store.find_user(realm_id, user_id).await?;
                Ok(user.as_ref().map(CachedUser::from_model))
            })
            .await?;

        Ok(snapshot.filter(|user| user.realm() == realm_id))
    }

    /// Resolves a username through the store, then reads the user through the cache.
    pub async fn get_user_by_username(
        &self,
        realm_id: &RealmId,
        username: &str,
    ) -> TesseraResult<Option<CachedUser>> {
        match self.store.find_user_by_username(realm_id, username).await? {
            Some(user) => self.get_user(realm_id, &user.id).await,
            None => Ok(None),
        }
    }

    /// Saves a user and invalidates its snapshot.
    pub async fn update_user(&self, user: &UserModel) -> TesseraResult<()> {
        self.store.save_user(user).await?;
        self.cache.invalidate(user.id.as_str());
        debug!(user_id = %user.id, "User updated");
        Ok(())
    }

    /// Replaces a credential of the same type and device.
    pub async fn update_credential(
        &self,
        realm_id: &RealmId,
        user_id: &UserId,
        credential: CredentialValue,
    ) -> TesseraResult<()> {
        self.modify(realm_id, user_id, |user| user.update_credential(credential))
            .await
    }

    /// Maps a role to the user.
    pub async fn grant_role(
        &self,
        realm_id: &RealmId,
        user_id: &UserId,
        role_id: &str,
    ) -> TesseraResult<()> {
        let role_id = role_id.to_string();
        self.modify(realm_id, user_id, move |user| {
            user.role_ids.insert(role_id);
        })
        .await
    }

    /// Removes a role mapping from the user.
    pub async fn delete_role_mapping(
        &self,
        realm_id: &RealmId,
        user_id: &UserId,
        role_id: &str,
    ) -> TesseraResult<()> {
        self.modify(realm_id, user_id, |user| {
            user.role_ids.remove(role_id);
        })
        .await
    }

    /// Adds the user to a group.
    pub async fn join_group(
        &self,
        realm_id: &RealmId,
        user_id: &UserId,
        group_id: &str,
    ) -> TesseraResult<()> {
        let group_id = group_id.to_string();
        self.modify(realm_id, user_id, move |user| {
            user.group_ids.insert(group_id);
        })
        .await
    }

    /// Removes the user from a group.
    pub async fn leave_group(
        &self,
        realm_id: &RealmId,
        user_id: &UserId,
        group_id: &str,
    ) -> TesseraResult<()> {
        self.modify(realm_id, user_id, |user| {
            user.group_ids.remove(group_id);
        })
        .await
    }

    /// Deletes a user and invalidates its snapshot.
    pub async fn remove_user(&self, realm_id: &RealmId, user_id: &UserId) -> TesseraResult<bool> {
        let removed = self.store.delete_user(realm_id, user_id).await?;
        self.cache.invalidate(user_id.as_str());
        if removed {
            info!(realm_id = %realm_id, user_id = %user_id, "User removed");
        }
        Ok(removed)
    }

    /// Deletes every user of a realm and drops all their snapshots.
    pub async fn on_realm_removed(&self, realm_id: &RealmId) -> TesseraResult<u64> {
        let removed = self.store.delete_realm_users(realm_id).await?;
        let evicted = self.cache.invalidate_realm(realm_id);
        info!(realm_id = %realm_id, removed, evicted, "Realm users removed");
        Ok(removed)
    }

    /// Drops a user snapshot after a change made outside this provider.
    pub fn invalidate(&self, user_id: &UserId) {
        self.cache.invalidate(user_id.as_str());
    }

    async fn modify<F>(&self, realm_id: &RealmId, user_id: &UserId, change: F) -> TesseraResult<()>
    where
        F: FnOnce(&mut UserModel) + Send,
    {
        let mut user = self
            .store
            .find_user(realm_id, user_id)
            .await?
            .ok_or_else(|| TesseraError::not_found("User", user_id))?;
        change(&mut user);
        self.store.save_user(&user).await?;
        self.cache.invalidate(user_id.as_str());
        debug!(user_id = %user_id, "User modified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::CacheManager;
    use crate::store::MockUserStore;
    use tessera_core::CREDENTIAL_OTP;

    fn alice() -> UserModel {
        UserModel::new(UserId::new("u1"), RealmId::new("r1"), "alice")
    }

    fn provider(store: MockUserStore) -> CachedUserProvider<MockUserStore> {
        let connection = CacheManager::builder().build().create().unwrap();
        CachedUserProvider::new(Arc::new(store), &connection).unwrap()
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let mut store = MockUserStore::new();
        store
            .expect_find_user()
            .times(1)
            .returning(|_, _| Ok(Some(alice())));
        let provider = provider(store);
        let realm = RealmId::new("r1");
        let id = UserId::new("u1");

        let first = provider.get_user(&realm, &id).await.unwrap().unwrap();
        let second = provider.get_user(&realm, &id).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(provider.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_other_realm_is_not_visible() {
        let mut store = MockUserStore::new();
        store
            .expect_find_user()
            .returning(|_, _| Ok(Some(alice())));
        let provider = provider(store);

        let user = provider
            .get_user(&RealmId::new("r2"), &UserId::new("u1"))
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_credential_change_invalidates() {
        let mut store = MockUserStore::new();
        store
            .expect_find_user()
            .times(2)
            .returning(|_, _| Ok(Some(alice())));
        store.expect_save_user().times(1).returning(|user| {
            assert!(user.otp_enabled);
            Ok(())
        });
        let provider = provider(store);
        let realm = RealmId::new("r1");
        let id = UserId::new("u1");

        provider.get_user(&realm, &id).await.unwrap();
        assert!(provider.cache().contains("u1"));

        provider
            .update_credential(&realm, &id, CredentialValue::new(CREDENTIAL_OTP, "secret"))
            .await
            .unwrap();
        assert!(!provider.cache().contains("u1"));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_snapshot() {
        let mut store = MockUserStore::new();
        store
            .expect_find_user()
            .returning(|_, _| Ok(Some(alice())));
        store
            .expect_save_user()
            .returning(|_| Err(TesseraError::Store("connection reset".to_string())));
        let provider = provider(store);
        let realm = RealmId::new("r1");
        let id = UserId::new("u1");

        provider.get_user(&realm, &id).await.unwrap();
        let err = provider.grant_role(&realm, &id, "admin").await.unwrap_err();

        assert!(err.is_retriable());
        assert!(provider.cache().contains("u1"));
    }

    #[tokio::test]
    async fn test_modify_missing_user_is_not_found() {
        let mut store = MockUserStore::new();
        store.expect_find_user().returning(|_, _| Ok(None));
        let provider = provider(store);

        let err = provider
            .join_group(&RealmId::new("r1"), &UserId::new("ghost"), "staff")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
