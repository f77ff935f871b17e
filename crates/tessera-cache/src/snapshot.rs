//! Immutable cache payloads projected from live models.

use crate::topology::CacheName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use tessera_core::{CredentialValue, RealmId, RealmModel, SessionLimits, UserId, UserModel};

/// A snapshot that can live in one of the entity caches.
pub trait CachedEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Cache holding this kind of snapshot.
    const CACHE: CacheName;

    /// Cache key (the entity id).
    fn cache_key(&self) -> &str;

    /// Realm the entity belongs to.
    fn realm_id(&self) -> &RealmId;
}

/// Point-in-time copy of a user.
///
/// Holds its own copies of every mutable collection; later changes to the
/// live model are never visible through a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedUser {
    id: UserId,
    realm_id: RealmId,
    username: String,
    created_timestamp: Option<i64>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    email_verified: bool,
    credentials: Vec<CredentialValue>,
    enabled: bool,
    otp_enabled: bool,
    federation_link: Option<String>,
    service_account_client_link: Option<String>,
    attributes: BTreeMap<String, Vec<String>>,
    required_actions: BTreeSet<String>,
    role_mappings: BTreeSet<String>,
    groups: BTreeSet<String>,
}

impl CachedUser {
    /// Projects a live user model.
    #[must_use]
    pub fn from_model(user: &UserModel) -> Self {
        Self {
            id: user.id.clone(),
            realm_id: user.realm_id.clone(),
            username: user.username.clone(),
            created_timestamp: user.created_timestamp,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            credentials: user.credentials.clone(),
            enabled: user.enabled,
            otp_enabled: user.otp_enabled,
            federation_link: user.federation_link.clone(),
            service_account_client_link: user.service_account_client_link.clone(),
            attributes: user.attributes.clone(),
            required_actions: user.required_actions.clone(),
            role_mappings: user.role_ids.clone(),
            groups: user.group_ids.clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    #[must_use]
    pub fn realm(&self) -> &RealmId {
        &self.realm_id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn created_timestamp(&self) -> Option<i64> {
        self.created_timestamp
    }

    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn is_email_verified(&self) -> bool {
        self.email_verified
    }

    #[must_use]
    pub fn credentials(&self) -> &[CredentialValue] {
        &self.credentials
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn is_otp_enabled(&self) -> bool {
        self.otp_enabled
    }

    #[must_use]
    pub fn federation_link(&self) -> Option<&str> {
        self.federation_link.as_deref()
    }

    #[must_use]
    pub fn service_account_client_link(&self) -> Option<&str> {
        self.service_account_client_link.as_deref()
    }

    /// Multi-valued attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.attributes
    }

    /// First value of an attribute.
    #[must_use]
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn required_actions(&self) -> &BTreeSet<String> {
        &self.required_actions
    }

    /// Ids of directly mapped roles.
    #[must_use]
    pub fn role_mappings(&self) -> &BTreeSet<String> {
        &self.role_mappings
    }

    /// Ids of groups the user belongs to.
    #[must_use]
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Returns true if the user has the role mapped directly.
    #[must_use]
    pub fn has_role(&self, role_id: &str) -> bool {
        self.role_mappings.contains(role_id)
    }

    /// Returns true if the user is a member of the group.
    #[must_use]
    pub fn is_member_of(&self, group_id: &str) -> bool {
        self.groups.contains(group_id)
    }
}

impl PartialEq for CachedUser {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.realm_id == other.realm_id
    }
}

impl Eq for CachedUser {}

impl Hash for CachedUser {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.realm_id.hash(state);
    }
}

impl CachedEntity for CachedUser {
    const CACHE: CacheName = CacheName::User;

    fn cache_key(&self) -> &str {
        self.id.as_str()
    }

    fn realm_id(&self) -> &RealmId {
        &self.realm_id
    }
}

/// Point-in-time copy of a realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRealm {
    id: RealmId,
    name: String,
    display_name: Option<String>,
    enabled: bool,
    session_limits: SessionLimits,
}

impl CachedRealm {
    /// Projects a live realm model.
    #[must_use]
    pub fn from_model(realm: &RealmModel) -> Self {
        Self {
            id: realm.id.clone(),
            name: realm.name.clone(),
            display_name: realm.display_name.clone(),
            enabled: realm.enabled,
            session_limits: realm.session_limits,
        }
    }

    #[must_use]
    pub fn id(&self) -> &RealmId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn session_limits(&self) -> SessionLimits {
        self.session_limits
    }
}

impl PartialEq for CachedRealm {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CachedRealm {}

impl CachedEntity for CachedRealm {
    const CACHE: CacheName = CacheName::Realm;

    fn cache_key(&self) -> &str {
        self.id.as_str()
    }

    fn realm_id(&self) -> &RealmId {
        &self.id
    }
}
