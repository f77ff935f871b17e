//! Session entities held by the session stores.
//!
//! Timestamps are whole seconds since the Unix epoch (see
//! [`tessera_core::current_time`]).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tessera_core::{ClientId, RealmId, SessionId, UserId};
use uuid::Uuid;

/// Lifecycle state of a user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, authentication still in progress.
    Created,
    /// Authenticated and usable.
    Active,
    /// Logged out or expired. Terminal.
    Removed,
}

/// Parameters of a new user session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserSession {
    pub realm_id: RealmId,
    pub user_id: UserId,
    pub login_username: String,
    pub ip_address: Option<String>,
    pub auth_method: Option<String>,
    pub remember_me: bool,
    pub broker_session_id: Option<String>,
    pub broker_user_id: Option<String>,
}

impl NewUserSession {
    #[must_use]
    pub fn new(realm_id: RealmId, user_id: UserId, login_username: impl Into<String>) -> Self {
        Self {
            realm_id,
            user_id,
            login_username: login_username.into(),
            ip_address: None,
            auth_method: None,
            remember_me: false,
            broker_session_id: None,
            broker_user_id: None,
        }
    }

    #[must_use]
    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    #[must_use]
    pub fn auth_method(mut self, auth_method: impl Into<String>) -> Self {
        self.auth_method = Some(auth_method.into());
        self
    }

    #[must_use]
    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    /// Links the session to an identity-broker session and user.
    #[must_use]
    pub fn brokered(
        mut self,
        broker_session_id: impl Into<String>,
        broker_user_id: impl Into<String>,
    ) -> Self {
        self.broker_session_id = Some(broker_session_id.into());
        self.broker_user_id = Some(broker_user_id.into());
        self
    }
}

/// A user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSessionEntity {
    pub id: SessionId,
    pub realm_id: RealmId,
    pub user_id: UserId,
    pub login_username: String,
    pub ip_address: Option<String>,
    pub auth_method: Option<String>,
    pub remember_me: bool,
    pub started: i64,
    pub last_session_refresh: i64,
    pub state: SessionState,
    pub broker_session_id: Option<String>,
    pub broker_user_id: Option<String>,
    pub notes: HashMap<String, String>,
    /// Client session ids by client. At most one client session per client.
    pub client_sessions: BTreeMap<ClientId, SessionId>,
}

impl UserSessionEntity {
    /// Builds a session in the `Created` state started at `now`.
    #[must_use]
    pub fn new(id: SessionId, request: NewUserSession, now: i64) -> Self {
        Self {
            id,
            realm_id: request.realm_id,
            user_id: request.user_id,
            login_username: request.login_username,
            ip_address: request.ip_address,
            auth_method: request.auth_method,
            remember_me: request.remember_me,
            started: now,
            last_session_refresh: now,
            state: SessionState::Created,
            broker_session_id: request.broker_session_id,
            broker_user_id: request.broker_user_id,
            notes: HashMap::new(),
            client_sessions: BTreeMap::new(),
        }
    }

    /// Whether a client session is attached for `client_id`.
    #[must_use]
    pub fn has_client(&self, client_id: &ClientId) -> bool {
        self.client_sessions.contains_key(client_id)
    }
}

/// A client session, attached to one user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSessionEntity {
    pub id: SessionId,
    pub realm_id: RealmId,
    pub client_id: ClientId,
    pub user_session_id: SessionId,
    pub timestamp: i64,
    pub action: Option<String>,
    pub protocol: Option<String>,
    pub redirect_uri: Option<String>,
    pub roles: BTreeSet<String>,
    pub notes: HashMap<String, String>,
}

impl ClientSessionEntity {
    #[must_use]
    pub fn new(
        id: SessionId,
        realm_id: RealmId,
        client_id: ClientId,
        user_session_id: SessionId,
        now: i64,
    ) -> Self {
        Self {
            id,
            realm_id,
            client_id,
            user_session_id,
            timestamp: now,
            action: None,
            protocol: None,
            redirect_uri: None,
            roles: BTreeSet::new(),
            notes: HashMap::new(),
        }
    }
}

/// Key of a login-failure record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoginFailureKey {
    pub realm_id: RealmId,
    pub username: String,
}

impl LoginFailureKey {
    #[must_use]
    pub fn new(realm_id: RealmId, username: impl Into<String>) -> Self {
        Self {
            realm_id,
            username: username.into(),
        }
    }
}

/// Brute-force detection counters for one username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginFailureEntity {
    pub key: LoginFailureKey,
    pub failed_login_not_before: i64,
    pub num_failures: u32,
    pub last_failure: i64,
    pub last_ip_failure: Option<String>,
}

impl LoginFailureEntity {
    #[must_use]
    pub fn new(key: LoginFailureKey) -> Self {
        Self {
            key,
            failed_login_not_before: 0,
            num_failures: 0,
            last_failure: 0,
            last_ip_failure: None,
        }
    }

    /// Counts one more failed login.
    pub fn increment_failures(&mut self, now: i64, ip_address: Option<&str>) {
        self.num_failures = self.num_failures.saturating_add(1);
        self.last_failure = now;
        if let Some(ip) = ip_address {
            self.last_ip_failure = Some(ip.to_string());
        }
    }

    /// Resets the counters, keeping the record.
    pub fn clear_failures(&mut self) {
        self.failed_login_not_before = 0;
        self.num_failures = 0;
        self.last_failure = 0;
        self.last_ip_failure = None;
    }
}

/// A limited-use token permitting client self-registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInitialAccessEntity {
    pub id: String,
    pub realm_id: RealmId,
    pub timestamp: i64,
    /// Lifetime in seconds. Zero never expires.
    pub expiration: i64,
    pub count: u32,
    pub remaining_count: u32,
}

impl ClientInitialAccessEntity {
    /// Creates a token with a fresh id allowing `count` registrations.
    #[must_use]
    pub fn new(realm_id: RealmId, expiration: i64, count: u32, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            realm_id,
            timestamp: now,
            expiration,
            count,
            remaining_count: count,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiration > 0 && self.timestamp + self.expiration < now
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining_count == 0
    }

    /// Usable for one more registration at `now`.
    #[must_use]
    pub fn is_valid(&self, now: i64) -> bool {
        !self.is_expired(now) && !self.is_exhausted()
    }
}
