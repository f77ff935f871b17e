//! Cached entity providers over the underlying stores.

mod realm;
mod user;

pub use realm::CachedRealmProvider;
pub use user::CachedUserProvider;

use crate::store::{RealmStore, UserStore};
use tessera_core::{RealmId, TesseraResult};
use tracing::info;

/// Deletes a realm together with its users.
///
/// User snapshots of the realm are dropped in one realm-wide invalidation
/// before the realm record itself goes away.
pub async fn remove_realm<R: RealmStore, U: UserStore>(
    realms: &CachedRealmProvider<R>,
    users: &CachedUserProvider<U>,
    realm_id: &RealmId,
) -> TesseraResult<bool> {
    let removed_users = users.on_realm_removed(realm_id).await?;
    let removed = realms.remove_realm(realm_id).await?;
    info!(realm_id = %realm_id, removed_users, "Realm deletion completed");
    Ok(removed)
}
