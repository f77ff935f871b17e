//! Live user model.

use crate::{RealmId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Credential type for hashed passwords.
pub const CREDENTIAL_PASSWORD: &str = "password";

/// Credential type for time/counter based one-time passwords.
pub const CREDENTIAL_OTP: &str = "otp";

/// A stored credential value as held by the user store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialValue {
    /// Credential type (`password`, `otp`, ...).
    pub kind: String,
    /// Encoded value (hash or secret).
    pub value: String,
    /// Device label for OTP credentials.
    pub device: Option<String>,
    /// Salt used when hashing.
    pub salt: Option<Vec<u8>>,
    /// Hash iterations.
    pub hash_iterations: u32,
    /// Counter for HOTP credentials.
    pub counter: u32,
    /// Algorithm name.
    pub algorithm: Option<String>,
    /// OTP digits.
    pub digits: u32,
    /// OTP period in seconds.
    pub period: u32,
    /// Creation timestamp in milliseconds.
    pub created_date: Option<i64>,
}

impl CredentialValue {
    /// Creates a credential with only type and value set.
    #[must_use]
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            device: None,
            salt: None,
            hash_iterations: 0,
            counter: 0,
            algorithm: None,
            digits: 0,
            period: 0,
            created_date: None,
        }
    }
}

/// Mutable user record as owned by the underlying user store.
///
/// This is the live model; cached reads never hand this out directly but
/// project it into an immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserModel {
    /// Unique identifier for the user.
    pub id: UserId,
    /// Realm the user belongs to.
    pub realm_id: RealmId,
    /// Username, unique within the realm.
    pub username: String,
    /// Creation timestamp in milliseconds.
    pub created_timestamp: Option<i64>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Whether the email address is verified.
    pub email_verified: bool,
    /// Stored credentials.
    pub credentials: Vec<CredentialValue>,
    /// Whether the account is enabled.
    pub enabled: bool,
    /// Whether OTP is enabled.
    pub otp_enabled: bool,
    /// Link to the federation provider that imported this user.
    pub federation_link: Option<String>,
    /// Client this user is the service account of.
    pub service_account_client_link: Option<String>,
    /// Multi-valued attributes.
    pub attributes: BTreeMap<String, Vec<String>>,
    /// Pending required actions.
    pub required_actions: BTreeSet<String>,
    /// Ids of directly mapped roles.
    pub role_ids: BTreeSet<String>,
    /// Ids of groups the user is a member of.
    pub group_ids: BTreeSet<String>,
}

impl UserModel {
    /// Creates a new enabled user with no profile data.
    #[must_use]
    pub fn new(id: UserId, realm_id: RealmId, username: impl Into<String>) -> Self {
        Self {
            id,
            realm_id,
            username: username.into(),
            created_timestamp: Some(crate::current_time_millis()),
            first_name: None,
            last_name: None,
            email: None,
            email_verified: false,
            credentials: Vec::new(),
            enabled: true,
            otp_enabled: false,
            federation_link: None,
            service_account_client_link: None,
            attributes: BTreeMap::new(),
            required_actions: BTreeSet::new(),
            role_ids: BTreeSet::new(),
            group_ids: BTreeSet::new(),
        }
    }

    /// Updates profile fields.
    pub fn update_profile(
        &mut self,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
    ) {
        if email != self.email {
            self.email_verified = false;
        }
        self.first_name = first_name;
        self.last_name = last_name;
        self.email = email;
    }

    /// Replaces all values of an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.attributes.insert(name.into(), values);
    }

    /// Returns the first value of an attribute.
    #[must_use]
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Removes an attribute.
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        self.attributes.remove(name).is_some()
    }

    /// Stores a credential, replacing any existing one of the same type and device.
    pub fn update_credential(&mut self, credential: CredentialValue) {
        self.credentials
            .retain(|c| !(c.kind == credential.kind && c.device == credential.device));
        if credential.kind == CREDENTIAL_OTP {
            self.otp_enabled = true;
        }
        self.credentials.push(credential);
    }
}
