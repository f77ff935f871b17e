//! The session store contract.
//!
//! Every lookup against a missing or removed key yields `None`, an empty
//! list, or `false`. Nothing in this contract fails with an error, so call
//! sites stay the same whether sessions live in this process or in a
//! clustered cache.

use crate::entities::{
    ClientInitialAccessEntity, ClientSessionEntity, LoginFailureEntity, NewUserSession,
    UserSessionEntity,
};
use std::collections::BTreeMap;
use std::ops::AddAssign;
use tessera_core::{ClientId, Interface, RealmId, SessionId, SessionLimits, UserId};

/// Result of consuming one use of a client-initial-access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// One use consumed; `remaining` uses are left.
    Decremented { remaining: u32 },
    /// The token had no uses left. Nothing changed.
    Exhausted,
    /// No such token.
    NotFound,
}

/// Counts of what one expiration sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpiredSessions {
    pub user_sessions: usize,
    pub client_sessions: usize,
    pub offline_user_sessions: usize,
    pub offline_client_sessions: usize,
    pub initial_access: usize,
}

impl ExpiredSessions {
    #[must_use]
    pub fn total(&self) -> usize {
        self.user_sessions
            + self.client_sessions
            + self.offline_user_sessions
            + self.offline_client_sessions
            + self.initial_access
    }
}

impl AddAssign for ExpiredSessions {
    fn add_assign(&mut self, other: Self) {
        self.user_sessions += other.user_sessions;
        self.client_sessions += other.client_sessions;
        self.offline_user_sessions += other.offline_user_sessions;
        self.offline_client_sessions += other.offline_client_sessions;
        self.initial_access += other.initial_access;
    }
}

/// Offset and limit for session listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Paging {
    pub first: usize,
    pub max: Option<usize>,
}

impl Paging {
    /// Everything.
    pub const ALL: Paging = Paging {
        first: 0,
        max: None,
    };

    #[must_use]
    pub fn new(first: usize, max: usize) -> Self {
        Self {
            first,
            max: Some(max),
        }
    }
}

/// User, client, and offline sessions, login failures, and
/// client-initial-access tokens.
pub trait UserSessionStore: Interface + Send + Sync {
    // --- user sessions ---

    /// Creates a session with a generated id.
    fn create_user_session(&self, request: NewUserSession) -> UserSessionEntity;

    /// Creates a session with a caller-supplied id. `None` if the id is taken.
    fn create_user_session_with_id(
        &self,
        id: SessionId,
        request: NewUserSession,
    ) -> Option<UserSessionEntity>;

    fn get_user_session(&self, realm_id: &RealmId, id: &SessionId) -> Option<UserSessionEntity>;

    fn get_user_sessions(&self, realm_id: &RealmId, user_id: &UserId) -> Vec<UserSessionEntity>;

    /// Sessions with a client session for `client_id`, least recently
    /// refreshed first.
    fn get_user_sessions_by_client(
        &self,
        realm_id: &RealmId,
        client_id: &ClientId,
        paging: Paging,
    ) -> Vec<UserSessionEntity>;

    fn get_user_session_by_broker_session_id(
        &self,
        realm_id: &RealmId,
        broker_session_id: &str,
    ) -> Option<UserSessionEntity>;

    fn get_user_sessions_by_broker_user_id(
        &self,
        realm_id: &RealmId,
        broker_user_id: &str,
    ) -> Vec<UserSessionEntity>;

    /// Number of online sessions with a client session for `client_id`.
    fn active_user_sessions(&self, realm_id: &RealmId, client_id: &ClientId) -> u64;

    /// Session counts per client across the realm.
    fn active_client_session_stats(
        &self,
        realm_id: &RealmId,
        offline: bool,
    ) -> BTreeMap<ClientId, u64>;

    /// Moves a `Created` session to `Active`. False unless it was `Created`.
    fn activate_user_session(&self, realm_id: &RealmId, id: &SessionId) -> bool;

    fn refresh_user_session(&self, realm_id: &RealmId, id: &SessionId, now: i64) -> bool;

    fn set_user_session_note(
        &self,
        realm_id: &RealmId,
        id: &SessionId,
        name: &str,
        value: &str,
    ) -> bool;

    /// Removes a session and its client sessions. False if already gone.
    fn remove_user_session(&self, realm_id: &RealmId, id: &SessionId) -> bool;

    fn remove_user_sessions(&self, realm_id: &RealmId, user_id: &UserId) -> usize;

    /// Removes every online session of a realm.
    fn remove_realm_sessions(&self, realm_id: &RealmId) -> usize;

    // --- client sessions ---

    /// Attaches a new client session to a user session, replacing any
    /// previous one for the same client. `None` if the user session is gone.
    fn create_client_session(
        &self,
        realm_id: &RealmId,
        client_id: &ClientId,
        user_session_id: &SessionId,
    ) -> Option<ClientSessionEntity>;

    fn get_client_session(&self, realm_id: &RealmId, id: &SessionId)
        -> Option<ClientSessionEntity>;

    fn touch_client_session(&self, realm_id: &RealmId, id: &SessionId, now: i64) -> bool;

    fn set_client_session_note(
        &self,
        realm_id: &RealmId,
        id: &SessionId,
        name: &str,
        value: &str,
    ) -> bool;

    /// Removes a client session and detaches it from its user session.
    fn remove_client_session(&self, realm_id: &RealmId, id: &SessionId) -> bool;

    // --- offline sessions ---

    /// Copies an online session into the offline store, restarted at the
    /// current time and without client sessions. Replaces an offline copy
    /// in the same realm; `None` if the id is taken by another realm.
    fn create_offline_user_session(
        &self,
        session: &UserSessionEntity,
    ) -> Option<UserSessionEntity>;

    fn get_offline_user_session(
        &self,
        realm_id: &RealmId,
        id: &SessionId,
    ) -> Option<UserSessionEntity>;

    fn get_offline_user_sessions(
        &self,
        realm_id: &RealmId,
        user_id: &UserId,
    ) -> Vec<UserSessionEntity>;

    fn get_offline_user_sessions_by_client(
        &self,
        realm_id: &RealmId,
        client_id: &ClientId,
        paging: Paging,
    ) -> Vec<UserSessionEntity>;

    fn offline_sessions_count(&self, realm_id: &RealmId, client_id: &ClientId) -> u64;

    /// Copies a client session under an offline user session. `None` if the
    /// offline user session does not exist.
    fn create_offline_client_session(
        &self,
        client_session: &ClientSessionEntity,
        offline_user_session_id: &SessionId,
    ) -> Option<ClientSessionEntity>;

    fn get_offline_client_session(
        &self,
        realm_id: &RealmId,
        id: &SessionId,
    ) -> Option<ClientSessionEntity>;

    fn remove_offline_user_session(&self, realm_id: &RealmId, id: &SessionId) -> bool;

    // --- login failures ---

    /// Returns the record for `(realm, username)`, creating an empty one if
    /// absent.
    fn create_login_failure(&self, realm_id: &RealmId, username: &str) -> LoginFailureEntity;

    fn get_login_failure(&self, realm_id: &RealmId, username: &str) -> Option<LoginFailureEntity>;

    /// Counts a failed login in place. `None` if there is no record.
    fn record_login_failure(
        &self,
        realm_id: &RealmId,
        username: &str,
        now: i64,
        ip_address: Option<&str>,
    ) -> Option<LoginFailureEntity>;

    fn set_failed_login_not_before(
        &self,
        realm_id: &RealmId,
        username: &str,
        not_before: i64,
    ) -> bool;

    fn clear_login_failure(&self, realm_id: &RealmId, username: &str) -> bool;

    fn remove_login_failure(&self, realm_id: &RealmId, username: &str) -> bool;

    fn remove_all_login_failures(&self, realm_id: &RealmId) -> usize;

    // --- client initial access ---

    fn create_or_update_client_initial_access(
        &self,
        entity: ClientInitialAccessEntity,
    ) -> ClientInitialAccessEntity;

    fn get_client_initial_access(
        &self,
        realm_id: &RealmId,
        id: &str,
    ) -> Option<ClientInitialAccessEntity>;

    fn list_client_initial_access(&self, realm_id: &RealmId) -> Vec<ClientInitialAccessEntity>;

    /// Consumes one use. An exhausted token stays in place until the next
    /// sweep and keeps reporting [`DecrementOutcome::Exhausted`].
    fn decrease_remaining_count(&self, realm_id: &RealmId, id: &str) -> DecrementOutcome;

    fn remove_client_initial_access(&self, realm_id: &RealmId, id: &str) -> bool;

    // --- housekeeping ---

    /// Drops everything the realm owns.
    fn on_realm_removed(&self, realm_id: &RealmId);

    /// Drops the client's online and offline client sessions.
    fn on_client_removed(&self, realm_id: &RealmId, client_id: &ClientId);

    /// Drops the user's online and offline sessions and login failures.
    fn on_user_removed(&self, realm_id: &RealmId, user_id: &UserId, username: &str);

    fn remove_expired(&self, realm_id: &RealmId, limits: &SessionLimits, now: i64)
        -> ExpiredSessions;

    /// Drops online sessions and login failures. Offline sessions survive.
    fn close(&self);
}
