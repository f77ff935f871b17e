//! Underlying stores behind the entity caches.

use async_trait::async_trait;
use tessera_core::{Interface, RealmId, RealmModel, TesseraResult, UserId, UserModel};

/// Authoritative user storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Interface + Send + Sync {
    /// Finds a user by ID within a realm.
    async fn find_user(&self, realm_id: &RealmId, user_id: &UserId)
        -> TesseraResult<Option<UserModel>>;

    /// Finds a user by username within a realm.
    async fn find_user_by_username(
        &self,
        realm_id: &RealmId,
        username: &str,
    ) -> TesseraResult<Option<UserModel>>;

    /// Inserts or replaces a user.
    async fn save_user(&self, user: &UserModel) -> TesseraResult<()>;

    /// Deletes a user. Returns false if it did not exist.
    async fn delete_user(&self, realm_id: &RealmId, user_id: &UserId) -> TesseraResult<bool>;

    /// Deletes every user of a realm, returning the count.
    async fn delete_realm_users(&self, realm_id: &RealmId) -> TesseraResult<u64>;
}

/// Authoritative realm storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RealmStore: Interface + Send + Sync {
    /// Finds a realm by ID.
    async fn find_realm(&self, realm_id: &RealmId) -> TesseraResult<Option<RealmModel>>;

    /// Finds a realm by name.
    async fn find_realm_by_name(&self, name: &str) -> TesseraResult<Option<RealmModel>>;

    /// Inserts or replaces a realm.
    async fn save_realm(&self, realm: &RealmModel) -> TesseraResult<()>;

    /// Deletes a realm. Returns false if it did not exist.
    async fn delete_realm(&self, realm_id: &RealmId) -> TesseraResult<bool>;
}
